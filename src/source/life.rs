//! Conway's Game of Life rendered as a camera feed.
//!
//! A coarse cell grid evolves underneath the full-resolution canvas; live
//! cells are drawn as colored blocks and the canvas fades hard between
//! generations, so deaths leave a brief afterglow. Each instance seeds
//! itself randomly, so every running period plays a different game.

use bytes::Bytes;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::source::{Frame, FrameSource, Pacer, SourceError, SourceSpec};

const GRID_H: usize = 36;
const GRID_W: usize = 72;
const SEED_DENSITY: f64 = 0.3;
const FADE: f32 = 0.1;

pub struct LifeSource {
    spec: SourceSpec,
    pacer: Pacer,
    alive: Vec<bool>,
    colors: Vec<[u8; 3]>,
    canvas: Vec<f32>,
    sequence: u64,
}

impl LifeSource {
    pub fn new(spec: &SourceSpec) -> Self {
        let mut rng = StdRng::from_entropy();
        let alive = (0..GRID_H * GRID_W)
            .map(|_| rng.gen_bool(SEED_DENSITY))
            .collect();
        let colors = (0..GRID_H * GRID_W)
            .map(|_| {
                let mut color = [0u8; 3];
                for channel in &mut color {
                    *channel = (rng.gen_range(0.3..0.9f32) * 255.0) as u8;
                }
                color
            })
            .collect();
        Self {
            spec: *spec,
            pacer: Pacer::for_spec(spec),
            alive,
            colors,
            canvas: vec![0.0; spec.width as usize * spec.height as usize * 3],
            sequence: 0,
        }
    }

    /// One generation. The boundary is dead, not wrapped.
    fn step(&mut self) {
        let mut next = vec![false; GRID_H * GRID_W];
        for y in 0..GRID_H {
            for x in 0..GRID_W {
                let mut neighbours = 0;
                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        if dy == 0 && dx == 0 {
                            continue;
                        }
                        let ny = y as i32 + dy;
                        let nx = x as i32 + dx;
                        if ny < 0 || nx < 0 || ny >= GRID_H as i32 || nx >= GRID_W as i32 {
                            continue;
                        }
                        if self.alive[ny as usize * GRID_W + nx as usize] {
                            neighbours += 1;
                        }
                    }
                }
                let idx = y * GRID_W + x;
                next[idx] = if self.alive[idx] {
                    neighbours == 2 || neighbours == 3
                } else {
                    neighbours == 3
                };
            }
        }
        self.alive = next;
    }

    fn render(&mut self) -> Vec<u8> {
        let width = self.spec.width as usize;
        let height = self.spec.height as usize;

        for value in &mut self.canvas {
            *value *= FADE;
        }

        let cell = (height / GRID_H).max(1);
        let radius = (cell / 3).max(1);
        for gy in 0..GRID_H {
            for gx in 0..GRID_W {
                if !self.alive[gy * GRID_W + gx] {
                    continue;
                }
                let color = self.colors[gy * GRID_W + gx];
                let cy = gy * cell + cell / 2;
                let cx = gx * cell + cell / 2;
                for y in cy.saturating_sub(radius)..(cy + radius).min(height) {
                    for x in cx.saturating_sub(radius)..(cx + radius).min(width) {
                        let idx = (y * width + x) * 3;
                        for channel in 0..3 {
                            self.canvas[idx + channel] = color[channel] as f32;
                        }
                    }
                }
            }
        }

        self.canvas.iter().map(|&v| v.min(255.0) as u8).collect()
    }
}

impl FrameSource for LifeSource {
    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        self.pacer.pace();
        self.step();
        let data = self.render();
        let frame = Frame::new(
            Bytes::from(data),
            self.sequence,
            self.spec.width,
            self.spec.height,
        );
        self.sequence += 1;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_spec() -> SourceSpec {
        SourceSpec::new(GRID_W as u32 * 2, GRID_H as u32 * 2, 1000)
    }

    fn idx(y: usize, x: usize) -> usize {
        y * GRID_W + x
    }

    #[test]
    fn blinker_oscillates() {
        let mut source = LifeSource::new(&tiny_spec());
        source.alive = vec![false; GRID_H * GRID_W];
        for x in 10..13 {
            source.alive[idx(10, x)] = true;
        }

        source.step();
        // A horizontal blinker becomes vertical.
        assert!(source.alive[idx(9, 11)]);
        assert!(source.alive[idx(10, 11)]);
        assert!(source.alive[idx(11, 11)]);
        assert!(!source.alive[idx(10, 10)]);
        assert!(!source.alive[idx(10, 12)]);

        source.step();
        for x in 10..13 {
            assert!(source.alive[idx(10, x)]);
        }
    }

    #[test]
    fn frames_are_full_rgb_and_sequenced() {
        let spec = tiny_spec();
        let mut source = LifeSource::new(&spec);
        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();
        assert_eq!(first.len(), (spec.width * spec.height * 3) as usize);
        assert_eq!(first.meta.sequence, 0);
        assert_eq!(second.meta.sequence, 1);
    }
}
