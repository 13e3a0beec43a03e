use crate::tools::args::ImageArgs;
use crate::tools::result::{ToolData, ToolResult};
use crate::tools::traits::{ImageGenerator, ImageRequest};
use anyhow::{Context, Result};

pub async fn generate_image(generator: &dyn ImageGenerator, args: ImageArgs) -> Result<ToolResult> {
    let prompt = args.prompt.trim();
    if prompt.is_empty() {
        return Ok(ToolResult::invalid("prompt is required"));
    }

    let request = ImageRequest {
        prompt: prompt.to_string(),
        negative_prompt: args.negative_prompt.trim().to_string(),
        width: args.width,
        height: args.height,
        seed: args.seed,
        workflow: args.workflow.filter(|w| !w.trim().is_empty()),
    };
    let image = generator
        .generate(request)
        .await
        .context("image generation failed")?;

    let message = format!(
        "Generated a {}x{} image in {:.1}s",
        image.width, image.height, image.elapsed_seconds
    );
    tracing::info!(
        bytes = image.bytes.len(),
        seed = ?image.seed,
        "image generated"
    );
    Ok(ToolResult::ok(message).with_data(ToolData::Image(image)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::result::ImageArtifact;
    use async_trait::async_trait;

    struct Fixed;

    #[async_trait]
    impl ImageGenerator for Fixed {
        async fn generate(&self, request: ImageRequest) -> Result<ImageArtifact> {
            Ok(ImageArtifact {
                bytes: vec![0x89, b'P', b'N', b'G'],
                format: "png".into(),
                seed: request.seed.or(Some(7)),
                width: request.width.unwrap_or(1024),
                height: request.height.unwrap_or(1024),
                workflow: request.workflow.unwrap_or_else(|| "default".into()),
                elapsed_seconds: 2.5,
            })
        }
    }

    #[tokio::test]
    async fn image_bytes_ride_in_the_data() -> Result<()> {
        let result = generate_image(
            &Fixed,
            ImageArgs {
                prompt: "a lighthouse at dusk".into(),
                width: Some(512),
                ..ImageArgs::default()
            },
        )
        .await?;
        assert_eq!(result.message, "Generated a 512x1024 image in 2.5s");
        match result.data {
            Some(ToolData::Image(image)) => {
                assert_eq!(image.bytes.len(), 4);
                assert_eq!(image.seed, Some(7));
            }
            other => panic!("unexpected data: {other:?}"),
        }

        let rejected = generate_image(&Fixed, ImageArgs::default()).await?;
        assert_eq!(rejected.error_text(), "prompt is required");
        Ok(())
    }
}
