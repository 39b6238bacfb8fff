fn main() {
    if let Err(e) = drivelink_lib::run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
