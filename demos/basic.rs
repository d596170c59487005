use little_owl::{OwlConfig, QueryRunner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OwlConfig::from_env()?;
    let runner = QueryRunner::from_config(&config)?;

    let rows = runner
        .run_query("SELECT species, wingspan_cm FROM owls.sightings LIMIT 10")
        .await?;

    let mut rows = rows.into_iter();
    if let Some(header) = rows.next() {
        println!("{}", header.join(" | "));
    }
    for row in rows {
        println!("{row:?}");
    }

    Ok(())
}
