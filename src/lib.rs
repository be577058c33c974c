pub use pano_core as core;
pub use pano_features as features;
pub use pano_imgproc as imgproc;
pub use pano_photo as photo;

pub use pano_photo::{
    build_panorama, AxisMode, NullObserver, Panorama, StitchAxis, StitchConfig, StitchError, StitchEvent,
    StitchObserver, Stitcher, TracingObserver, VerticalPlacement,
};

pub mod io;

use rayon::ThreadPoolBuilder;
use std::env;
use std::sync::OnceLock;

static THREAD_POOL_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialize the global Rayon thread pool used by feature extraction,
/// matching and warping.
///
/// Call this once at application startup. Repeated calls are idempotent and
/// return the first initialization result.
///
/// Priority order:
/// 1. explicit `num_threads`
/// 2. `PANOSTITCH_THREADS` env var
/// 3. Rayon default
pub fn init_thread_pool(num_threads: Option<usize>) -> Result<(), String> {
    THREAD_POOL_INIT
        .get_or_init(|| {
            let configured = match num_threads {
                Some(n) => Some(n),
                None => read_threads_from_env()?,
            };

            let mut builder = ThreadPoolBuilder::new();
            if let Some(n) = configured {
                if n == 0 {
                    return Err("thread count must be >= 1".to_string());
                }
                builder = builder.num_threads(n);
            }
            builder.build_global().map_err(|e| e.to_string())
        })
        .clone()
}

fn read_threads_from_env() -> Result<Option<usize>, String> {
    let raw = match env::var("PANOSTITCH_THREADS") {
        Ok(v) => v,
        Err(env::VarError::NotPresent) => return Ok(None),
        Err(e) => return Err(format!("failed to read PANOSTITCH_THREADS: {e}")),
    };
    let parsed: usize = raw
        .parse()
        .map_err(|_| format!("PANOSTITCH_THREADS must be a positive integer, got '{raw}'"))?;
    if parsed == 0 {
        return Err("PANOSTITCH_THREADS must be >= 1".to_string());
    }
    Ok(Some(parsed))
}
