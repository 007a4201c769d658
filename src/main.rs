fn main() {
    if let Err(err) = caproj::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
