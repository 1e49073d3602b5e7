use super::*;

#[derive(Debug, Parser)]
#[command(version, about = "Stratum V1 mining proxy")]
pub struct Arguments {
    #[command(flatten)]
    options: Options,
}

impl Arguments {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub async fn run(self, cancel: CancellationToken) -> Result {
        let settings = Arc::new(
            Settings::from_options(self.options).context("invalid configuration")?,
        );

        Supervisor::new(settings).run(cancel).await
    }
}
