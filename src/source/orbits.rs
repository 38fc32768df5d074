//! Planar three-body gravity toy rendered as a camera feed.
//!
//! Three unit masses fall toward each other under a softened inverse-square
//! pull, drawn as radially shaded disks over a slowly fading canvas so each
//! body drags a trail. The simulation lives in the unit square (-1, 1)²;
//! when a body drifts near the edge the whole system reseeds, which is what
//! keeps the feed interesting indefinitely.

use bytes::Bytes;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::source::{Frame, FrameSource, Pacer, SourceError, SourceSpec};

const BODIES: usize = 3;
const G: f64 = 1e-4;
const DT: f64 = 0.1;
const ESCAPE: f64 = 0.9;
const DISK_RADIUS: i32 = 4;
const FADE: f32 = 0.9;

#[derive(Clone, Copy)]
struct Body {
    pos: [f64; 2],
    vel: [f64; 2],
    color: [f32; 3],
}

pub struct OrbitsSource {
    spec: SourceSpec,
    pacer: Pacer,
    rng: StdRng,
    bodies: [Body; BODIES],
    canvas: Vec<f32>,
    sequence: u64,
}

impl OrbitsSource {
    pub fn new(spec: &SourceSpec) -> Self {
        let mut rng = StdRng::from_entropy();
        let bodies = Self::seed(&mut rng);
        Self {
            spec: *spec,
            pacer: Pacer::for_spec(spec),
            rng,
            bodies,
            canvas: vec![0.0; spec.width as usize * spec.height as usize * 3],
            sequence: 0,
        }
    }

    fn seed(rng: &mut StdRng) -> [Body; BODIES] {
        [(); BODIES].map(|_| Body {
            pos: [rng.gen_range(-0.7..0.7), rng.gen_range(-0.7..0.7)],
            vel: [0.0; 2],
            color: {
                let mut color = [0.0f32; 3];
                for channel in &mut color {
                    *channel = rng.gen_range(0.2..0.9f32);
                }
                color
            },
        })
    }

    fn step(&mut self) {
        let mut acc = [[0.0f64; 2]; BODIES];
        for i in 0..BODIES {
            for j in 0..BODIES {
                if i == j {
                    continue;
                }
                let dx = self.bodies[j].pos[0] - self.bodies[i].pos[0];
                let dy = self.bodies[j].pos[1] - self.bodies[i].pos[1];
                let dist = (dx * dx + dy * dy).sqrt().max(1e-3);
                // Unnormalized offset over d²: an effective 1/d pull, which
                // keeps close encounters from flinging bodies off-screen.
                let pull = G / (dist * dist);
                acc[i][0] += pull * dx;
                acc[i][1] += pull * dy;
            }
        }
        for (body, a) in self.bodies.iter_mut().zip(acc) {
            body.vel[0] += DT * a[0];
            body.vel[1] += DT * a[1];
            body.pos[0] += DT * body.vel[0];
            body.pos[1] += DT * body.vel[1];
        }

        if self
            .bodies
            .iter()
            .any(|b| b.pos[0].abs() > ESCAPE || b.pos[1].abs() > ESCAPE)
        {
            self.bodies = Self::seed(&mut self.rng);
        }
    }

    fn render(&mut self) -> Vec<u8> {
        let width = self.spec.width as i32;
        let height = self.spec.height as i32;

        for value in &mut self.canvas {
            *value *= FADE;
        }

        for body in &self.bodies {
            // (-1, 1)² maps to the full canvas, y pointing up.
            let cx = (((1.0 + body.pos[0]) / 2.0) * width as f64) as i32;
            let cy = (((1.0 - body.pos[1]) / 2.0) * height as f64) as i32;
            for dy in -DISK_RADIUS..=DISK_RADIUS {
                for dx in -DISK_RADIUS..=DISK_RADIUS {
                    let d2 = dx * dx + dy * dy;
                    if d2 >= DISK_RADIUS * DISK_RADIUS {
                        continue;
                    }
                    let x = cx + dx;
                    let y = cy + dy;
                    if x < 0 || y < 0 || x >= width || y >= height {
                        continue;
                    }
                    let shade = 1.0 - d2 as f32 / (DISK_RADIUS * DISK_RADIUS) as f32;
                    let idx = ((y * width + x) * 3) as usize;
                    for channel in 0..3 {
                        let value = &mut self.canvas[idx + channel];
                        *value = (*value + body.color[channel] * shade * 255.0).min(255.0);
                    }
                }
            }
        }

        self.canvas.iter().map(|&v| v as u8).collect()
    }
}

impl FrameSource for OrbitsSource {
    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        self.pacer.pace();
        // Several integration steps per frame keeps motion visible at low
        // frame rates without a larger, less stable DT.
        for _ in 0..20 {
            self.step();
        }
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
