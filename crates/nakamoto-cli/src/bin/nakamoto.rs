fn main() {
    if let Err(err) = nakamoto_cli::run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
