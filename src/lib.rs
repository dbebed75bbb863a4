#![doc = r#"
tilevips: a tile-evaluating image engine binding with a multi-handler
progress event adapter.

Images are lazy: constructors and operations only describe pixels, and work
happens when something realizes the image (`max`, `avg`, `to_array`,
`write_to_file`). Realization walks the image in strips of rows and, when
progress is enabled, the engine fires three signals per pass: `preeval`,
`eval` after every strip, and `posteval`. Each engine signal slot takes a
single C callback; the [`ProgressAdapter`] installs one trampoline per phase
and fans every event out to any number of Rust handlers, in registration
order.

Stability
---------
The public library API is experimental in initial releases and may evolve.
Breaking changes can occur.

Quick start
-----------
```rust
use tilevips::Image;

fn main() -> tilevips::Result<()> {
    let im = Image::black(100, 100, 1)?;
    assert_eq!(im.width(), 100);
    assert_eq!(im.max()?, 0.0);
    Ok(())
}
```

Progress handlers
-----------------
```rust
use std::sync::{Arc, Mutex};
use tilevips::{Image, Phase};

fn main() -> tilevips::Result<()> {
    let im = Image::grey(256, 256)?;
    im.set_progress(true)?;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    im.signal_connect(Phase::Eval, move |_, p| {
        log.lock().unwrap().push(p.percent);
        Ok(())
    })?;
    im.signal_connect(Phase::PostEval, |_, p| {
        println!("done in {:?}", p.elapsed);
        Ok(())
    })?;

    im.avg()?;
    assert_eq!(seen.lock().unwrap().last(), Some(&100));
    Ok(())
}
```

A handler that returns an error or panics is logged and skipped; the
handlers after it still run, and the evaluation itself is unaffected.

Generic calls
-------------
Every operation is also described in a catalog and can be called by name:

```rust
use tilevips::{Image, Value, operation};

fn main() -> tilevips::Result<()> {
    let out = operation::call("black", &[Value::Int(8), Value::Int(8)], &[("bands", Value::Int(3))])?;
    let im = out.as_image().unwrap();
    assert_eq!(im.bands(), 3);

    let bright = im.call("linear", &[Value::Int(1), Value::Int(10)], &[])?;
    assert_eq!(bright.as_image().unwrap().max()?, 10.0);
    Ok(())
}
```

Error handling
--------------
All public functions return `tilevips::Result<T>`; match on `tilevips::Error`
to handle specific cases.

```rust
use tilevips::{Error, Image};

fn main() {
    match Image::black(0, 10, 1) {
        Ok(_) => unreachable!(),
        Err(Error::InvalidArgument { arg, .. }) => assert_eq!(arg, "width"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: the [`Image`] handle.
- [`core`]: the progress adapter and the operation catalog.
- [`native`]: the engine layer, with image objects, signal slots and evaluation.
- [`io`]: file loaders and savers.
- [`config`]: runtime configuration, loadable from JSON.
- [`logging`]: tracing setup and an in-memory capture layer.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod logging;
pub mod native;
pub mod types;

// Curated public API surface
pub use api::Image;
pub use config::{Config, ProgressConfig};
pub use crate::core::operation;
pub use crate::core::progress::{
    HandlerError, HandlerResult, ProgressAdapter, ProgressSnapshot, RegistrationToken,
};
pub use error::{Error, Result};
pub use io::{LoadOptions, SaveOptions};
pub use types::{Access, BandFormat, CyclePolicy, Phase, ReenablePolicy, Value};

/// Install `config` process-wide. The progress policies also apply to the
/// global adapter from the next `enable_progress` on.
pub fn init(config: Config) -> Result<()> {
    let progress = config.progress;
    config::install(config)?;
    ProgressAdapter::global().set_policy(progress);
    Ok(())
}

/// Library version component: 0 major, 1 minor, 2 patch.
pub fn version(component: usize) -> Option<u32> {
    let part = match component {
        0 => env!("CARGO_PKG_VERSION_MAJOR"),
        1 => env!("CARGO_PKG_VERSION_MINOR"),
        2 => env!("CARGO_PKG_VERSION_PATCH"),
        _ => return None,
    };
    part.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_components() {
        assert_eq!(version(0), Some(0));
        assert!(version(1).is_some());
        assert!(version(2).is_some());
        assert_eq!(version(3), None);
    }
}
