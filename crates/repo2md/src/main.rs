fn main() -> anyhow::Result<()> {
    repo2md::init();
    repo2md::cli::run()
}
