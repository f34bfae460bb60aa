use std::{io::Cursor, path::PathBuf};

use docforge::DocumentRecord;

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_docforge")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "docforge.exe"
            } else {
                "docforge"
            });
            p
        })
}

#[test]
fn cli_random_then_render_writes_png() {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();

    let record_path = dir.join("record.json");
    let out_path = dir.join("out.png");
    let _ = std::fs::remove_file(&out_path);

    let status = std::process::Command::new(exe())
        .args(["random", "--kind", "id-card", "--seed", "7", "--out"])
        .arg(&record_path)
        .status()
        .unwrap();
    assert!(status.success());

    let record: DocumentRecord =
        serde_json::from_slice(&std::fs::read(&record_path).unwrap()).unwrap();
    assert_eq!(record.field("id_number").len(), 13);

    // Template asset directory with a solid-color id-card background.
    let assets_dir = dir.join("assets");
    std::fs::create_dir_all(&assets_dir).unwrap();
    let img = image::RgbaImage::from_pixel(32, 20, image::Rgba([100, 120, 150, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(assets_dir.join("id-card.png"), buf).unwrap();

    let status = std::process::Command::new(exe())
        .args(["render", "--kind", "id-card", "--seed", "7", "--record"])
        .arg(&record_path)
        .arg("--assets")
        .arg(&assets_dir)
        .arg("--out")
        .arg(&out_path)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(out_path.exists());

    let decoded = docforge::decode_image(&std::fs::read(&out_path).unwrap()).unwrap();
    assert_eq!((decoded.width, decoded.height), (1200, 756));
}

#[test]
fn cli_render_survives_a_missing_template_directory() {
    let dir = PathBuf::from("target").join("cli_smoke_degraded");
    std::fs::create_dir_all(&dir).unwrap();
    let out_path = dir.join("degraded.png");
    let _ = std::fs::remove_file(&out_path);

    let status = std::process::Command::new(exe())
        .args([
            "render",
            "--kind",
            "visa",
            "--seed",
            "3",
            "--assets",
            "does/not/exist",
            "--out",
        ])
        .arg(&out_path)
        .status()
        .unwrap();
    assert!(status.success());

    let decoded = docforge::decode_image(&std::fs::read(&out_path).unwrap()).unwrap();
    assert_eq!((decoded.width, decoded.height), (1770, 1181));
}
