fn main() {
    loadcell_report::cli::run();
}
