//! End-to-end request handling against a real source tree and the
//! `image`-crate backend.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageprinter::handler::{ImagePrinter, Outcome};
use imageprinter::imaging::{BackendError, ImageBackend, Pipeline, RustBackend};
use imageprinter::link::LinkGenerator;
use imageprinter::options::{OptionSet, Separators};
use imageprinter::responder::Status;
use imageprinter::source::{Source, SourceImage};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const REQUEST: &str = "/ip/image__width-200,height-200,quality-80,crop-true.jpg";
const CACHE_FILE: &str = "image__width-200,height-200,quality-80,crop-true.jpg";

/// Real backend that counts renders.
#[derive(Default)]
struct CountingBackend {
    inner: RustBackend,
    renders: AtomicUsize,
}

impl CountingBackend {
    fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl ImageBackend for CountingBackend {
    fn render(
        &self,
        source: &SourceImage,
        pipeline: &Pipeline,
        format: ImageFormat,
    ) -> Result<Vec<u8>, BackendError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.inner.render(source, pipeline, format)
    }
}

fn write_source(path: &Path, width: u32, height: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 200]));
    DynamicImage::ImageRgb8(img)
        .save_with_format(path, ImageFormat::Jpeg)
        .unwrap();
}

fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

struct Site {
    src: TempDir,
    dest: TempDir,
    backend: Arc<CountingBackend>,
    printer: ImagePrinter,
}

fn site_with(separators: Separators) -> Site {
    let src = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    write_source(&src.path().join("image.jpg"), 300, 200);
    let backend = Arc::new(CountingBackend::default());
    let printer = ImagePrinter::builder(dest.path(), Source::PathRoot(src.path().to_path_buf()))
        .prefix("/ip")
        .separators(separators)
        .backend(backend.clone())
        .max_age(Duration::from_secs(86_400))
        .build();
    Site {
        src,
        dest,
        backend,
        printer,
    }
}

fn site() -> Site {
    site_with(Separators::default())
}

#[test]
fn first_request_materializes_and_serves() {
    let site = site();
    let response = site.printer.handle(REQUEST);

    assert_eq!(response.status, Status::Ok);
    assert_eq!(site.backend.renders(), 1);
    let cache_file = site.dest.path().join(CACHE_FILE);
    assert_eq!(response.body, fs::read(&cache_file).unwrap());
    assert_eq!(response.header("Content-Type"), Some("image/jpeg"));
    assert_eq!(response.header("Cache-Control"), Some("public, max-age=86400"));

    let img = image::load_from_memory(&response.body).unwrap();
    assert_eq!((img.width(), img.height()), (200, 200));
}

#[test]
fn repeated_request_is_served_from_cache() {
    let site = site();
    let first = site.printer.handle(REQUEST);
    let second = site.printer.handle(REQUEST);

    assert_eq!(site.backend.renders(), 1);
    assert_eq!(first.body, second.body);
    assert_eq!(first.header("ETag"), second.header("ETag"));
    assert_eq!(
        site.printer.resolve_request(REQUEST).unwrap().outcome,
        Outcome::Cached
    );
}

#[test]
fn newer_source_triggers_regeneration() {
    let site = site();
    site.printer.handle(REQUEST);
    let cache_file = site.dest.path().join(CACHE_FILE);
    let now = SystemTime::now();
    set_mtime(&cache_file, now - Duration::from_secs(120));
    set_mtime(&site.src.path().join("image.jpg"), now - Duration::from_secs(60));

    let variant = site.printer.resolve_request(REQUEST).unwrap();
    assert_eq!(variant.outcome, Outcome::Rendered);
    assert_eq!(site.backend.renders(), 2);
    let cache_mtime = fs::metadata(&cache_file).unwrap().modified().unwrap();
    assert!(cache_mtime >= now - Duration::from_secs(60));
}

#[test]
fn path_without_options_marker_is_404() {
    let site = site();
    let response = site.printer.handle("/ip/image.jpg");

    assert_eq!(response.status, Status::NotFound);
    assert_eq!(site.backend.renders(), 0);
    assert_eq!(fs::read_dir(site.dest.path()).unwrap().count(), 0);
}

#[test]
fn unregistered_operation_is_404_and_writes_nothing() {
    let separators = Separators {
        value: "_".into(),
        ..Separators::default()
    };
    let site = site_with(separators);
    let response = site.printer.handle("/ip/image__op_unregistered-name.jpg");

    assert_eq!(response.status, Status::NotFound);
    assert_eq!(site.backend.renders(), 0);
    assert_eq!(fs::read_dir(site.dest.path()).unwrap().count(), 0);
}

#[test]
fn registered_operation_is_selected_by_op() {
    let site = site();
    site.printer
        .registry()
        .register("thumb", |_: &OptionSet, pipeline: &mut Pipeline| {
            pipeline.resize(Some(32), Some(32)).center_crop(32, 32);
            Ok(())
        });

    let response = site.printer.handle("/ip/image__op-thumb.jpg");
    assert_eq!(response.status, Status::Ok);
    let img = image::load_from_memory(&response.body).unwrap();
    assert_eq!((img.width(), img.height()), (32, 32));
}

#[test]
fn generated_links_resolve_to_their_cache_files() {
    let site = site();
    let links = LinkGenerator::new("/ip", OptionSet::new());
    let url = links
        .link("image.jpg", Some(&OptionSet::new().with("width", 120u32)))
        .unwrap();
    assert_eq!(url, "/ip/image__width-120,height-200,crop-true,quality-80.jpg");

    let response = site.printer.handle(&url);
    assert_eq!(response.status, Status::Ok);
    assert!(
        site.dest
            .path()
            .join("image__width-120,height-200,crop-true,quality-80.jpg")
            .is_file()
    );
}

#[test]
fn oversized_request_is_404_without_rendering() {
    let site = site();
    let response = site
        .printer
        .handle("/ip/image__width-4000000000,height-4000000000,quality-80.jpg");

    assert_eq!(response.status, Status::NotFound);
    assert_eq!(site.backend.renders(), 0);
    assert_eq!(fs::read_dir(site.dest.path()).unwrap().count(), 0);
}

#[test]
fn corrupt_source_is_500() {
    let site = site();
    fs::write(site.src.path().join("broken.jpg"), b"not a jpeg").unwrap();
    let response = site.printer.handle("/ip/broken__width-10.jpg");

    assert_eq!(response.status, Status::InternalServerError);
    assert!(!site.dest.path().join("broken__width-10.jpg").exists());
}
