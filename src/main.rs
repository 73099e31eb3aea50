fn main() {
    reverbfx::cli::run_cli();
}
