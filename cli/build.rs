use std::borrow::Cow;
use std::{
    env,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
    process::Command,
};

fn main() {
    println!("cargo:rerun-if-env-changed=PREFMAN_GIT_REVISION");
    if let Err(e) = write_version_files() {
        panic!("Failed to create the version files: {:?}", e);
    }
}

fn out_file(name: &str) -> PathBuf {
    Path::new(&env::var("OUT_DIR").expect("OUT_DIR")).join(name)
}

fn write_version_files() -> io::Result<()> {
    let version = env::var("CARGO_PKG_VERSION").expect("CARGO_PKG_VERSION");
    let target = env::var("TARGET").expect("TARGET");

    let mut simple = File::create(out_file("simple_version_string"))?;
    write!(&mut simple, "\"{}\"", version)?;

    let git_rev = match get_git_rev() {
        Ok(v) => Cow::Owned(v),
        Err(_) => Cow::Borrowed("unknown"),
    };
    let mut full = File::create(out_file("version_string"))?;
    write!(
        &mut full,
        "r#\"prefman {} ({})\nrev {}\"#",
        version,
        target,
        git_rev.trim(),
    )
}

fn get_git_rev() -> io::Result<String> {
    if let Ok(rev) = env::var("PREFMAN_GIT_REVISION") {
        return Ok(rev);
    }
    let out = Command::new("git").args(["rev-parse", "HEAD"]).output()?;
    if out.status.success() {
        if let Ok(rev) = String::from_utf8(out.stdout) {
            return Ok(rev);
        }
    }
    git_rev_from_file()
}

fn git_rev_from_file() -> io::Result<String> {
    let manifest = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR");
    fs::read_to_string(Path::new(&manifest).join("../.git/refs/heads/main"))
}
