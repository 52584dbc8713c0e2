fn main() {
    if let Err(err) = tts_diagnose::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
