//! Noise generation for the synthetic world.
//!
//! Every sample is drawn from a caller-supplied RNG so that a seeded run is
//! reproducible.

use rand::Rng;

/// Gaussian noise with the given standard deviation.
///
/// Uses the Box-Muller transform.
pub fn gaussian_noise<R: Rng + ?Sized>(rng: &mut R, std_dev: f32) -> f32 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f32 = rng.gen();
    let u2: f32 = rng.gen();

    // Avoid log(0)
    let u1 = u1.max(1e-10);

    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
    z0 * std_dev
}
