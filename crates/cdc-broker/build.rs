fn main() {
    if std::env::var_os("PROTOC").is_none() {
        if let Ok(path) = protoc_bin_vendored::protoc_bin_path() {
            unsafe {
                std::env::set_var("PROTOC", path);
            }
        }
    }
    tonic_build::configure()
        .build_server(true)
        .compile_protos(&["proto/pubsub_api.proto"], &["proto"])
        .expect("failed to compile pubsub_api.proto");
}
