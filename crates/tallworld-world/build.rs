use serde::Deserialize;
use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

#[derive(Deserialize, Debug)]
struct Material {
    id: u16,
    name: String,
    opacity: u8,
}

fn main() {
    let materials_json_path = "materials.json";
    let materials_json =
        fs::read_to_string(materials_json_path).expect("Failed to read materials.json");

    let mut materials: Vec<Material> =
        serde_json::from_str(&materials_json).expect("Failed to parse materials.json");
    materials.sort_by_key(|m| m.id);

    for pair in materials.windows(2) {
        assert!(pair[0].id != pair[1].id, "Duplicate material id {}", pair[0].id);
    }
    for material in &materials {
        assert!(material.opacity <= 15, "Opacity of {} exceeds 15", material.name);
    }

    let out_dir = env::var_os("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("materials.rs");
    let mut out_file = File::create(&dest_path).expect("Failed to create materials.rs");

    writeln!(&mut out_file, "pub static MATERIALS: &[Material] = &[").unwrap();
    for material in &materials {
        writeln!(
            &mut out_file,
            "    Material {{ id: {}, name: {:?}, opacity: {} }},",
            material.id, material.name, material.opacity
        )
        .unwrap();
    }
    writeln!(&mut out_file, "];").unwrap();

    println!("cargo:rerun-if-changed={}", materials_json_path);
}
