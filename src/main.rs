fn main() -> anyhow::Result<()> {
    dic_mesh::cli::run()
}
