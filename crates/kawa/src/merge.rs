use std::path::Path;

use tokio::{fs::File, io::AsyncWriteExt};

use crate::error::KawaResult;

/// Byte-exact concatenation of the input files, strictly in the order
/// given. The inputs arrive in manifest order, so this is the step
/// that restores stream continuity.
///
/// Any pre-existing file at `output_path` is replaced. On failure the
/// output is removed; a half-written merge must not be mistakable for
/// a finished one. Input files are left untouched.
pub async fn concat_merge<P, O>(ordered_paths: &[P], output_path: O) -> KawaResult<()>
where
    P: AsRef<Path>,
    O: AsRef<Path>,
{
    let output_path = output_path.as_ref();
    if output_path.exists() {
        tokio::fs::remove_file(output_path).await?;
    }

    let mut output = File::create(output_path).await?;
    match copy_all(ordered_paths, &mut output).await {
        Ok(()) => {
            output.flush().await?;
            output.sync_all().await?;
            Ok(())
        }
        Err(e) => {
            drop(output);
            let _ = tokio::fs::remove_file(output_path).await;
            Err(e)
        }
    }
}

async fn copy_all<P>(ordered_paths: &[P], output: &mut File) -> KawaResult<()>
where
    P: AsRef<Path>,
{
    for path in ordered_paths {
        let mut input = File::open(path.as_ref()).await?;
        tokio::io::copy(&mut input, output).await?;
    }
    Ok(())
}
