fn main() {
    lessrs::cli::run();
}
