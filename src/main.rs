fn main() {
    if let Err(err) = datasmith::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
