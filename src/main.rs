fn main() -> Result<(), Box<dyn std::error::Error>> {
    cliai::cli::main()
}
