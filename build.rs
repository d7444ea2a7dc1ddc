//! Build script: version stamping and pre-flight checks for GPU features.
//!
//! Verifies that required toolkits are installed before whisper-rs-sys tries
//! to compile, so a missing CUDA or Vulkan SDK fails with a readable message
//! instead of a wall of cc errors.

use std::process::Command;

fn main() {
    // Embed git short hash for version string
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if cfg!(feature = "cuda") {
        check_cuda();
    }
    if cfg!(feature = "vulkan") {
        check_tool(
            "vulkan",
            "vulkaninfo",
            "Vulkan SDK not found. Install it (e.g. 'sudo apt install vulkan-tools libvulkan-dev') \
             or build without --features vulkan.",
        );
    }
    if cfg!(feature = "hipblas") {
        check_tool(
            "hipblas",
            "hipcc",
            "ROCm not found. Install the ROCm toolkit or build without --features hipblas.",
        );
    }
    if cfg!(feature = "openblas") {
        let found = Command::new("pkg-config")
            .args(["--exists", "openblas"])
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !found {
            println!(
                "cargo::warning=openblas feature enabled but pkg-config cannot find openblas; \
                 the whisper-rs-sys build may fail below"
            );
        }
    }
}

fn check_cuda() {
    match Command::new("nvcc").arg("--version").output() {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout);
            if let Some((major, minor)) = parse_cuda_version(&text) {
                println!(
                    "cargo::warning=building with CUDA toolkit {}.{}; if the whisper-rs-sys \
                     build fails below, check that your driver matches this toolkit",
                    major, minor
                );
            }
        }
        _ => {
            println!(
                "cargo::warning=cuda feature enabled but nvcc was not found on PATH; \
                 install the CUDA toolkit or build without --features cuda"
            );
        }
    }
}

fn check_tool(feature: &str, tool: &str, hint: &str) {
    let found = Command::new(tool)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !found {
        println!(
            "cargo::warning={} feature enabled but {} not found. {}",
            feature, tool, hint
        );
    }
}

/// Parse "release X.Y" out of nvcc --version output.
fn parse_cuda_version(nvcc_output: &str) -> Option<(u32, u32)> {
    let release_pos = nvcc_output.find("release ")?;
    let after = &nvcc_output[release_pos + "release ".len()..];
    let version_str: String = after
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts = version_str.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nvcc_release_line() {
        let output = "nvcc: NVIDIA (R) Cuda compiler driver\n\
                      Cuda compilation tools, release 12.4, V12.4.131";
        assert_eq!(parse_cuda_version(output), Some((12, 4)));
    }

    #[test]
    fn returns_none_without_release_marker() {
        assert_eq!(parse_cuda_version("no version here"), None);
    }

    #[test]
    fn handles_trailing_comma() {
        assert_eq!(parse_cuda_version("release 11.8, V11.8.89"), Some((11, 8)));
    }
}
