fn main() -> anyhow::Result<()> {
    workdiary::cli::run()
}
