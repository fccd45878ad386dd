// Build script for the rotation trainer
// Places the sample config next to the built binary

use std::env;
use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=rotation_trainer.toml");

    let Ok(out_dir) = env::var("OUT_DIR") else {
        return;
    };

    // OUT_DIR = target/<profile>/build/<crate>-<hash>/out
    let Some(target_dir) = Path::new(&out_dir).ancestors().nth(3) else {
        println!("cargo:warning=Could not locate target directory");
        return;
    };

    let config_src = Path::new("rotation_trainer.toml");
    let config_dst = target_dir.join("rotation_trainer.toml");

    if config_src.exists() {
        match fs::copy(config_src, &config_dst) {
            Ok(_) => println!(
                "cargo:warning=Copied config file to {}",
                config_dst.display()
            ),
            Err(e) => println!("cargo:warning=Failed to copy config file: {}", e),
        }
    }
}
