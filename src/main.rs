fn main() {
    if let Err(e) = yliftdaily_lib::run() {
        log::error!("{}", e);
        eprintln!("yliftdaily: {}", e);
        std::process::exit(1);
    }
}
