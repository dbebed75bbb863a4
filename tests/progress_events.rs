use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ndarray::Array3;
use tilevips::logging::CaptureLayer;
use tilevips::native::{Header, NativeError, NativeImage, TileRect};
use tilevips::{
    Access, BandFormat, CyclePolicy, Error, Image, LoadOptions, Phase, ProgressAdapter,
    ProgressConfig,
};
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;

type Events = Arc<Mutex<Vec<(Phase, u32)>>>;

/// One recording handler per phase on `image`.
fn record_all(adapter: &ProgressAdapter, image: &Image) -> Events {
    let events: Events = Arc::default();
    for phase in Phase::ALL {
        let log = Arc::clone(&events);
        adapter
            .register(image, phase, move |_, p| {
                log.lock().unwrap().push((phase, p.percent));
                Ok(())
            })
            .unwrap();
    }
    events
}

fn assert_one_pass(events: &[(Phase, u32)]) {
    assert_eq!(events.first().map(|e| e.0), Some(Phase::PreEval));
    assert_eq!(events.last().map(|e| e.0), Some(Phase::PostEval));
    let middle = &events[1..events.len() - 1];
    assert!(middle.iter().all(|e| e.0 == Phase::Eval), "{:?}", events);
    assert!(middle.windows(2).all(|w| w[0].1 <= w[1].1), "{:?}", events);
}

fn write_ramp(path: &std::path::Path, width: usize, height: usize) {
    Image::xyz(width, height)
        .unwrap()
        .extract_band(0, 1)
        .unwrap()
        .cast(BandFormat::UChar)
        .write_to_file(path)
        .unwrap();
}

#[test]
fn file_loaded_image_reports_one_ordered_pass() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    write_ramp(&input, 64, 64);

    let image = Image::new_from_file(&input, &LoadOptions::sequential()).unwrap();
    let adapter = ProgressAdapter::new(ProgressConfig::default());
    adapter.enable_progress(&image).unwrap();
    let events = record_all(&adapter, &image);

    image.write_to_file(&dir.path().join("out.tif")).unwrap();

    let events = events.lock().unwrap().clone();
    assert_one_pass(&events);
    // 64 rows in 16-row strips
    assert_eq!(events.len(), 1 + 4 + 1);
    assert_eq!(events[events.len() - 2].1, 100);
}

#[test]
fn sequential_image_fails_a_second_pass_but_still_posts() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    write_ramp(&input, 32, 48);

    let options = LoadOptions {
        access: Access::Sequential,
    };
    let image = Image::new_from_file(&input, &options).unwrap();
    let adapter = ProgressAdapter::new(ProgressConfig::default());
    adapter.enable_progress(&image).unwrap();
    let events = record_all(&adapter, &image);

    image.write_to_file(&dir.path().join("first.png")).unwrap();
    events.lock().unwrap().clear();

    let err = image.write_to_file(&dir.path().join("second.png")).unwrap_err();
    assert!(matches!(
        err,
        Error::Native(NativeError::OutOfOrderRead { line: 0 })
    ));
    let events = events.lock().unwrap().clone();
    assert_eq!(events, vec![(Phase::PreEval, 0), (Phase::PostEval, 0)]);
}

#[test]
fn repeated_passes_each_report_a_cycle() {
    let image = Image::grey(32, 32).unwrap();
    let adapter = ProgressAdapter::new(ProgressConfig::default());
    adapter.enable_progress(&image).unwrap();
    let events = record_all(&adapter, &image);

    image.avg().unwrap();
    image.max().unwrap();

    let events = events.lock().unwrap().clone();
    let pres = events.iter().filter(|e| e.0 == Phase::PreEval).count();
    let posts = events.iter().filter(|e| e.0 == Phase::PostEval).count();
    assert_eq!((pres, posts), (2, 2));
    let split = events.iter().position(|e| e.0 == Phase::PostEval).unwrap() + 1;
    assert_one_pass(&events[..split]);
    assert_one_pass(&events[split..]);
}

#[test]
fn single_shot_reports_only_the_first_pass() {
    let image = Image::grey(32, 32).unwrap();
    let adapter = ProgressAdapter::new(ProgressConfig {
        cycle: CyclePolicy::SingleShot,
        ..ProgressConfig::default()
    });
    adapter.enable_progress(&image).unwrap();
    let events = record_all(&adapter, &image);

    image.avg().unwrap();
    let after_first = events.lock().unwrap().len();
    image.avg().unwrap();

    assert_eq!(events.lock().unwrap().len(), after_first);
    assert_one_pass(&events.lock().unwrap());
}

#[test]
fn failing_handlers_are_logged_and_skipped() {
    let image = Image::black(16, 16, 1).unwrap();
    let adapter = ProgressAdapter::new(ProgressConfig::default());
    adapter.enable_progress(&image).unwrap();

    adapter
        .register(&image, Phase::PostEval, |_, _| Err("disk full".into()))
        .unwrap();
    adapter
        .register(&image, Phase::PostEval, |_, _| panic!("handler bug"))
        .unwrap();
    let reached = Arc::new(Mutex::new(0));
    let count = Arc::clone(&reached);
    adapter
        .register(&image, Phase::PostEval, move |_, _| {
            *count.lock().unwrap() += 1;
            Ok(())
        })
        .unwrap();

    let capture = CaptureLayer::new();
    let subscriber = Registry::default().with(capture.clone());
    let max = tracing::subscriber::with_default(subscriber, || image.max().unwrap());

    assert_eq!(max, 0.0);
    assert_eq!(*reached.lock().unwrap(), 1);
    let entries = capture.entries();
    assert!(
        entries
            .iter()
            .any(|e| e.level == tracing::Level::WARN && e.message.contains("disk full"))
    );
    assert!(
        entries
            .iter()
            .any(|e| e.level == tracing::Level::ERROR && e.message.contains("handler bug"))
    );
}

#[test]
fn handlers_run_on_the_evaluating_thread() {
    let image = Image::grey(64, 64).unwrap();
    image.set_progress(true).unwrap();
    let threads = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&threads);
    image
        .signal_connect(Phase::Eval, move |_, _| {
            log.lock().unwrap().push(std::thread::current().id());
            Ok(())
        })
        .unwrap();

    let worker = image.clone();
    let worker_id = std::thread::spawn(move || {
        worker.avg().unwrap();
        std::thread::current().id()
    })
    .join()
    .unwrap();

    let threads = threads.lock().unwrap();
    assert!(!threads.is_empty());
    assert!(threads.iter().all(|&t| t == worker_id));
}

#[test]
fn handler_receives_the_image_it_was_registered_on() {
    let image = Image::black(8, 8, 1).unwrap();
    let adapter = ProgressAdapter::new(ProgressConfig::default());
    adapter.enable_progress(&image).unwrap();
    let seen = Arc::new(Mutex::new(None));
    let log = Arc::clone(&seen);
    adapter
        .register(&image, Phase::PreEval, move |im, _| {
            *log.lock().unwrap() = Some(im.id());
            Ok(())
        })
        .unwrap();

    image.max().unwrap();
    assert_eq!(*seen.lock().unwrap(), Some(image.id()));
}

#[test]
fn enabling_mid_pass_reports_nothing_until_the_next_pass() {
    let adapter = ProgressAdapter::new(ProgressConfig::default());
    let events: Events = Arc::default();
    let slot: Arc<Mutex<Option<Image>>> = Arc::default();
    let armed = Arc::new(AtomicBool::new(true));

    let source = {
        let (adapter, events, slot, armed) = (
            adapter.clone(),
            Arc::clone(&events),
            Arc::clone(&slot),
            Arc::clone(&armed),
        );
        Arc::new(move |r: TileRect| {
            if armed.swap(false, Ordering::SeqCst) {
                // Taking the handle out of the slot breaks the source -> image cycle
                let image = slot.lock().unwrap().take().unwrap();
                adapter.enable_progress(&image).unwrap();
                for phase in Phase::ALL {
                    let log = Arc::clone(&events);
                    adapter
                        .register(&image, phase, move |_, p| {
                            log.lock().unwrap().push((phase, p.percent));
                            Ok(())
                        })
                        .unwrap();
                }
            }
            Ok::<_, NativeError>(Array3::from_elem((r.height, r.width, 1), 1.0))
        })
    };
    let image = Image::from(NativeImage::new(
        Header::new(8, 64, 1, BandFormat::UChar),
        source,
    ));
    *slot.lock().unwrap() = Some(image.clone());

    assert_eq!(image.avg().unwrap(), 1.0);
    assert!(adapter.is_tracked(&image));
    assert!(events.lock().unwrap().is_empty());

    image.avg().unwrap();
    let events = events.lock().unwrap().clone();
    assert_one_pass(&events);
    let pres = events.iter().filter(|e| e.0 == Phase::PreEval).count();
    let posts = events.iter().filter(|e| e.0 == Phase::PostEval).count();
    assert_eq!((pres, posts), (1, 1));
    assert_eq!(events[events.len() - 2].1, 100);
}

#[test]
fn handler_using_its_argument_does_not_keep_the_image_alive() {
    let adapter = ProgressAdapter::new(ProgressConfig::default());
    let image = Image::grey(16, 16).unwrap();
    adapter.enable_progress(&image).unwrap();
    let widths = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&widths);
    let token = adapter
        .register(&image, Phase::PostEval, move |im, _| {
            log.lock().unwrap().push(im.width());
            Ok(())
        })
        .unwrap();

    image.avg().unwrap();
    assert_eq!(*widths.lock().unwrap(), vec![16]);
    assert_eq!(image.native().ref_count(), 1);

    drop(image);
    assert!(!adapter.unregister(token));
}
