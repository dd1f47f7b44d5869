fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the vendored protoc so builds need no system install
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    println!("cargo:rerun-if-changed=proto");

    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .compile_protos(&["proto/draftstore.proto"], &["proto"])?;

    Ok(())
}
