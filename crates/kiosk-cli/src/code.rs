//! `kiosk code`: pairing code samples

use anyhow::Result;
use clap::Args;
use kiosk_core::generate_code;

#[derive(Args, Debug)]
pub struct CodeArgs {
    /// Number of codes to print
    #[arg(long, short = 'n', default_value_t = 1)]
    pub count: usize,
}

impl CodeArgs {
    pub fn codes(&self) -> Vec<String> {
        (0..self.count).map(|_| generate_code()).collect()
    }

    pub fn run(self) -> Result<()> {
        for code in self.codes() {
            println!("{code}");
        }
        Ok(())
    }
}
