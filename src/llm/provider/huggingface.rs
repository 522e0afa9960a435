use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::StreamExt;
use llama_cpp::standard_sampler::{SamplerStage, StandardSampler};
use llama_cpp::{LlamaModel, LlamaParams, SessionParams, Token};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::{
    Generation, InferenceProvider, LoadOptions, ProgressHook, ProviderError, RawProgress,
    RawStatus, SamplingParams, TextGeneration,
};

/// The single trusted origin for model files. There is deliberately no
/// local/offline resolution path: every load fetches from this host.
const REMOTE_HOST: &str = "https://huggingface.co";
const REMOTE_PATH_TEMPLATE: &str = "{model}/resolve/{revision}/{file}";
const REVISION: &str = "main";

const QUANTIZED_FILE: &str = "ggml-model-q4_0.gguf";
const FULL_PRECISION_FILE: &str = "ggml-model-f16.gguf";

/// Provider that streams GGUF model files from the Hugging Face hub and
/// serves generation through llama.cpp.
pub struct HuggingFaceProvider {
    client: reqwest::Client,
    download_dir: PathBuf,
    context_size: u32,
}

impl HuggingFaceProvider {
    pub fn new(download_dir: PathBuf, context_size: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            download_dir,
            context_size,
        }
    }

    fn remote_url(model_id: &str, file: &str) -> String {
        let path = REMOTE_PATH_TEMPLATE
            .replace("{model}", model_id)
            .replace("{revision}", REVISION)
            .replace("{file}", file);
        format!("{}/{}", REMOTE_HOST, path)
    }

    /// Streams one model file to the download directory, reporting byte
    /// counts against the announced content length as it goes.
    async fn fetch_model_file(
        &self,
        model_id: &str,
        file: &str,
        progress: Option<&ProgressHook>,
    ) -> Result<PathBuf, ProviderError> {
        let url = Self::remote_url(model_id, file);
        info!("Fetching model file: {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let total = response.content_length();

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let destination = self
            .download_dir
            .join(format!("{}--{}", model_id.replace('/', "--"), file));
        let mut output = tokio::fs::File::create(&destination).await?;

        let mut stream = response.bytes_stream();
        let mut loaded: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            output.write_all(&chunk).await?;
            loaded += chunk.len() as u64;
            if let Some(hook) = progress {
                hook(RawProgress {
                    status: RawStatus::Progress,
                    loaded: Some(loaded),
                    total,
                    file: Some(file.to_string()),
                });
            }
        }
        output.flush().await?;

        if let Some(hook) = progress {
            hook(RawProgress {
                status: RawStatus::Done,
                loaded: Some(loaded),
                total,
                file: Some(file.to_string()),
            });
        }

        info!("Fetched {} bytes to {}", loaded, destination.display());
        Ok(destination)
    }
}

impl InferenceProvider for HuggingFaceProvider {
    fn load<'a>(
        &'a self,
        model_id: &'a str,
        options: LoadOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn TextGeneration>, ProviderError>> {
        Box::pin(async move {
            if model_id.trim().is_empty() {
                return Err("model identifier must not be empty".into());
            }

            let file = if options.quantized {
                QUANTIZED_FILE
            } else {
                FULL_PRECISION_FILE
            };
            let path = self
                .fetch_model_file(model_id, file, options.progress.as_ref())
                .await?;

            // llama.cpp loads synchronously; keep it off the async executor.
            let load_path = path.clone();
            let model = tokio::task::spawn_blocking(move || {
                LlamaModel::load_from_file(&load_path, LlamaParams::default())
            })
            .await
            .map_err(|e| format!("model load task failed: {}", e))?
            .map_err(|e| format!("failed to load model file {}: {}", path.display(), e))?;

            info!("Model initialized from {}", path.display());
            Ok(Arc::new(LlamaHandle {
                model: Arc::new(model),
                context_size: self.context_size,
            }) as Arc<dyn TextGeneration>)
        })
    }
}

/// Generation handle over a loaded llama.cpp model. Each call runs a fresh
/// session so prompts from different callers never share context.
struct LlamaHandle {
    model: Arc<LlamaModel>,
    context_size: u32,
}

impl TextGeneration for LlamaHandle {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        params: SamplingParams,
    ) -> BoxFuture<'a, Result<Vec<Generation>, ProviderError>> {
        Box::pin(async move {
            let model = Arc::clone(&self.model);
            let prompt = prompt.to_string();
            let context_size = self.context_size;

            let text = tokio::task::spawn_blocking(move || {
                complete(&model, &prompt, context_size, &params)
            })
            .await
            .map_err(|e| -> ProviderError { format!("generation task failed: {}", e).into() })??;

            Ok(vec![Generation {
                generated_text: text,
            }])
        })
    }
}

fn complete(
    model: &LlamaModel,
    prompt: &str,
    context_size: u32,
    params: &SamplingParams,
) -> Result<String, ProviderError> {
    let session_params = SessionParams {
        n_ctx: context_size,
        n_batch: 512,
        ..Default::default()
    };
    let mut session = model
        .create_session(session_params)
        .map_err(|e| format!("failed to create session: {}", e))?;

    session
        .advance_context(prompt)
        .map_err(|e| format!("failed to feed prompt: {}", e))?;

    let sampler = if params.do_sample {
        StandardSampler::new_softmax(
            vec![
                SamplerStage::RepetitionPenalty {
                    repetition_penalty: params.repetition_penalty,
                    frequency_penalty: 0.0,
                    presence_penalty: 0.0,
                    last_n: 64,
                },
                SamplerStage::TopK(params.top_k),
                SamplerStage::TopP(params.top_p),
                SamplerStage::Temperature(params.temperature),
            ],
            1,
        )
    } else {
        StandardSampler::new_greedy()
    };

    let completions = session
        .start_completing_with(sampler, params.max_new_tokens)
        .map_err(|e| format!("failed to start completion: {}", e))?;

    let mut generated: Vec<Token> = Vec::new();
    for token in completions {
        generated.push(token);
        if generated.len() >= params.max_new_tokens {
            break;
        }
    }

    // Only freshly generated tokens are decoded here, so the prompt echo
    // never reaches the caller unless it asked for the full text.
    let mut text = String::new();
    for token in generated {
        text.push_str(&model.token_to_piece(token));
    }

    if params.return_full_text {
        Ok(format!("{}{}", prompt, text))
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_url_follows_host_template() {
        let url = HuggingFaceProvider::remote_url("openai-community/gpt2", "ggml-model-q4_0.gguf");
        assert_eq!(
            url,
            "https://huggingface.co/openai-community/gpt2/resolve/main/ggml-model-q4_0.gguf"
        );
    }
}
