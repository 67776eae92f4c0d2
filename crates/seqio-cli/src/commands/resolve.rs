//! Host time resolution.

use crate::ResolveArgs;
use anyhow::{Context, Result};
use seqio_io::resolver::FrameStatus;

use super::Session;

pub fn run(args: ResolveArgs) -> Result<()> {
    let session = Session::new()?;
    let mut reader = session.open(&args.input, &args.time)?;
    if let Some(proxy) = &args.proxy {
        reader
            .set_proxy_file(Some(proxy.as_str()))
            .with_context(|| format!("Failed to set proxy: {proxy}"))?;
    }

    println!("{}  (time domain {})", args.input, reader.time_domain()?);
    for time in &args.times {
        match reader.resolve(*time) {
            Ok(resolved) => {
                let path = match &resolved.path {
                    Some(path) => path.display().to_string(),
                    None => "black".to_string(),
                };
                let status = match resolved.status {
                    FrameStatus::WithinSequence => "",
                    FrameStatus::BeforeSequence => " (before)",
                    FrameStatus::AfterSequence => " (after)",
                    FrameStatus::Black => " (black)",
                    FrameStatus::Error => " (error)",
                };
                println!("  {time} -> {} {path}{status}", resolved.frame);
                if let Some(proxy) = &resolved.proxy_path {
                    println!("      proxy {}", proxy.display());
                }
            }
            Err(e) => println!("  {time} -> error: {e}"),
        }
    }
    Ok(())
}
