use super::*;
use crate::test_helpers::{image_bytes, png_bytes};
use image::ImageFormat;

// =============================================================================
// validate
// =============================================================================

#[test]
fn validate_accepts_exactly_five_mib() {
    for mime in ALLOWED_IMAGE_TYPES {
        assert!(validate(mime, MAX_IMAGE_BYTES).is_ok(), "{mime} at limit");
    }
}

#[test]
fn validate_rejects_one_byte_over() {
    let err = validate("image/png", MAX_IMAGE_BYTES + 1).unwrap_err();
    assert!(matches!(err, ImageError::TooLarge { size } if size == MAX_IMAGE_BYTES + 1));
    assert!(err.to_string().contains("5MB"));
    assert!(err.is_validation());
}

#[test]
fn validate_rejects_disallowed_type_regardless_of_size() {
    for size in [0, 1, MAX_IMAGE_BYTES, MAX_IMAGE_BYTES * 4] {
        let err = validate("image/gif", size).unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedType(ref m) if m == "image/gif"));
        assert!(err.to_string().contains("JPG, PNG, and WebP"));
    }
}

#[test]
fn validate_type_is_exact_match() {
    assert!(validate("IMAGE/PNG", 10).is_err());
    assert!(validate("image/jpg", 10).is_err());
    assert!(validate("", 10).is_err());
}

#[test]
fn validate_image_uses_declared_fields() {
    let file = ImageFile { name: "x.png".into(), mime: "image/png".into(), size: 42, source: ImageSource::Bytes(vec![]) };
    assert!(validate_image(&file).is_ok());

    let big = ImageFile { size: MAX_IMAGE_BYTES + 1, ..file };
    assert_eq!(validate_image(&big).unwrap_err().error_code(), "E_IMAGE_TOO_LARGE");
}

// =============================================================================
// ImageFile
// =============================================================================

#[test]
fn from_bytes_records_size() {
    let file = ImageFile::from_bytes("cat.png", "image/png", vec![1, 2, 3]);
    assert_eq!(file.size, 3);
    assert_eq!(file.mime, "image/png");
}

#[test]
fn mime_for_path_maps_extensions() {
    assert_eq!(mime_for_path(Path::new("a.JPG")), "image/jpeg");
    assert_eq!(mime_for_path(Path::new("a.jpeg")), "image/jpeg");
    assert_eq!(mime_for_path(Path::new("a.png")), "image/png");
    assert_eq!(mime_for_path(Path::new("a.webp")), "image/webp");
    assert_eq!(mime_for_path(Path::new("a.gif")), "image/gif");
    assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
}

#[tokio::test]
async fn from_path_reads_metadata_and_encode_reads_bytes() {
    let path = std::env::temp_dir().join(format!("cat-consult-{}.png", uuid::Uuid::now_v7()));
    let bytes = png_bytes(4, 4);
    tokio::fs::write(&path, &bytes).await.unwrap();

    let file = ImageFile::from_path(&path).await.unwrap();
    assert_eq!(file.mime, "image/png");
    assert_eq!(file.size, bytes.len() as u64);

    let url = encode(&file).await.unwrap();
    assert_eq!(url, to_data_url("image/png", &bytes));

    tokio::fs::remove_file(&path).await.unwrap();
}

#[tokio::test]
async fn from_path_missing_file_is_read_error() {
    let path = std::env::temp_dir().join(format!("cat-consult-missing-{}.png", uuid::Uuid::now_v7()));
    let err = ImageFile::from_path(&path).await.unwrap_err();
    assert!(matches!(err, ImageError::Read(_)));
}

#[tokio::test]
async fn encode_fails_with_read_error_when_file_vanishes() {
    let file = ImageFile {
        name: "gone.png".into(),
        mime: "image/png".into(),
        size: 10,
        source: ImageSource::Path(std::env::temp_dir().join(format!("gone-{}.png", uuid::Uuid::now_v7()))),
    };
    let err = encode(&file).await.unwrap_err();
    assert_eq!(err.error_code(), "E_IMAGE_READ");
    assert!(!err.is_validation());
}

// =============================================================================
// data URL
// =============================================================================

#[test]
fn data_url_has_mime_prefix_and_base64_payload() {
    assert_eq!(to_data_url("image/png", b"hi"), "data:image/png;base64,aGk=");
}

#[tokio::test]
async fn prepare_without_compression_keeps_original_bytes() {
    let bytes = png_bytes(8, 8);
    let file = ImageFile::from_bytes("cat.png", "image/png", bytes.clone());
    let url = prepare(&file, None).await.unwrap();
    assert_eq!(url, to_data_url("image/png", &bytes));
}

#[tokio::test]
async fn prepare_with_compression_emits_jpeg() {
    let file = ImageFile::from_bytes("cat.png", "image/png", png_bytes(64, 32));
    let settings = CompressionSettings { max_width: 16, max_height: 16, quality: 70 };
    let url = prepare(&file, Some(settings)).await.unwrap();
    assert!(url.starts_with("data:image/jpeg;base64,"));

    let payload = url.trim_start_matches("data:image/jpeg;base64,");
    let decoded = BASE64.decode(payload).unwrap();
    let img = image::load_from_memory(&decoded).unwrap();
    assert_eq!((img.width(), img.height()), (16, 8));
}

// =============================================================================
// compression
// =============================================================================

#[test]
fn scaled_dimensions_within_bounds_unchanged() {
    assert_eq!(scaled_dimensions(800, 600, 1024, 1024), (800, 600));
    assert_eq!(scaled_dimensions(1024, 1024, 1024, 1024), (1024, 1024));
}

#[test]
fn scaled_dimensions_preserves_aspect_ratio() {
    assert_eq!(scaled_dimensions(2048, 1024, 1024, 1024), (1024, 512));
    assert_eq!(scaled_dimensions(1000, 4000, 1024, 1024), (256, 1024));
    // Width fits, height does not: the tighter bound still drives both.
    assert_eq!(scaled_dimensions(900, 2000, 1024, 1000), (450, 1000));
}

#[test]
fn scaled_dimensions_never_collapses_to_zero() {
    assert_eq!(scaled_dimensions(10_000, 1, 100, 100), (100, 1));
}

#[test]
fn compress_downsamples_large_image() {
    let out = compress(&png_bytes(300, 150), 100, 100, 80).unwrap();
    let img = image::load_from_memory(&out).unwrap();
    assert_eq!((img.width(), img.height()), (100, 50));
    assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
}

#[test]
fn compress_reencodes_small_image_without_resizing() {
    let out = compress(&image_bytes(40, 30, ImageFormat::Jpeg), 100, 100, 50).unwrap();
    let img = image::load_from_memory(&out).unwrap();
    assert_eq!((img.width(), img.height()), (40, 30));
}

#[test]
fn compress_rejects_non_image_bytes() {
    let err = compress(b"definitely not an image", 100, 100, 80).unwrap_err();
    assert!(matches!(err, ImageError::Decode(_)));
    assert_eq!(err.error_code(), "E_IMAGE_DECODE");
}
