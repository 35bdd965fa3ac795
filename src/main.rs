fn main() {
    if let Err(err) = achievement_bridge_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
