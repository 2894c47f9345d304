fn main() -> anyhow::Result<()> {
    neuralnotes::cli::run()
}
