//! Integration test crate for Rastermill.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on the core, engine and ops crates to verify they work
//! together.

#[cfg(test)]
mod blur;

#[cfg(test)]
mod dilate;

#[cfg(test)]
mod engine;

#[cfg(test)]
mod keying;

#[cfg(test)]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
