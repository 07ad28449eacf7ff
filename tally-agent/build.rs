#[cfg(feature = "ebpf")]
fn main() -> anyhow::Result<()> {
    use anyhow::{anyhow, Context};
    use std::env;

    // Skip eBPF build if we're already building for the eBPF target
    if env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default() == "bpf" {
        return Ok(());
    }

    if env::var("CARGO_CFG_TARGET_OS").unwrap_or_default() != "linux" {
        println!("cargo:warning=eBPF compilation skipped: probes only run on Linux");
        return Ok(());
    }

    // tally-probes sits outside the workspace, so ask for its own metadata
    let manifest_dir = env::var("CARGO_MANIFEST_DIR")?;
    let probes_manifest = std::path::Path::new(&manifest_dir).join("../tally-probes/Cargo.toml");
    println!("cargo:rerun-if-changed={}", probes_manifest.display());

    let aya_build::cargo_metadata::Metadata { packages, .. } =
        aya_build::cargo_metadata::MetadataCommand::new()
            .manifest_path(&probes_manifest)
            .no_deps()
            .exec()
            .context("MetadataCommand::exec")?;

    let probes = packages
        .into_iter()
        .find(|pkg| pkg.name == "tally-probes")
        .ok_or_else(|| anyhow!("tally-probes package not found"))?;

    aya_build::build_ebpf([probes])?;

    let out_dir = env::var("OUT_DIR")?;
    let probe_path = format!("{}/tally_probes", out_dir);
    if !std::path::Path::new(&probe_path).exists() {
        return Err(anyhow!(
            "eBPF probe compilation failed: {} not found",
            probe_path
        ));
    }

    Ok(())
}

#[cfg(not(feature = "ebpf"))]
fn main() {}
