use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::codec::strip_data_uri_prefix;
use crate::config::ServiceConfig;
use crate::error::{RecipeMuseError, Result};
use crate::models::{
    ChatMessage, ChatRequest, GeneratedRecipes, IdentifiedIngredients, ImageRequest, Recipe,
    RecipeImage,
};
use crate::transport::Transport;

#[cfg(test)]
use mockall::automock;

const GENERATED_IMAGE_MIME: &str = "image/png";

/// Boundary to the generative backend. Every call is fallible I/O.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Names of the ingredients visible in a base-64 encoded image.
    async fn identify_ingredients(&self, encoded_image: &str, mime_type: &str)
    -> Result<Vec<String>>;

    async fn generate_recipes(&self, ingredients: &[String]) -> Result<Vec<Recipe>>;

    /// One illustration for one recipe.
    async fn generate_image(&self, recipe: &Recipe) -> Result<RecipeImage>;
}

pub struct ModelGenerationService {
    tx: Arc<dyn Transport>,
    text_model: String,
    vision_model: String,
    image_model: String,
    image_size: String,
    temperature: f32,
    max_tokens: i32,
    recipe_count: u8,
}

impl ModelGenerationService {
    pub fn new(tx: Arc<dyn Transport>, cfg: &ServiceConfig) -> Self {
        Self {
            tx,
            text_model: cfg.text_model.clone(),
            vision_model: cfg.vision_model.clone(),
            image_model: cfg.image_model.clone(),
            image_size: cfg.image_size.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            recipe_count: cfg.recipe_count,
        }
    }

    /// Send a chat request and decode the first choice as JSON.
    async fn chat_json<T: DeserializeOwned>(&self, request: ChatRequest, what: &str) -> Result<T> {
        let response = self.tx.chat(&request).await?;

        let choice = response.choices.first().ok_or_else(|| {
            RecipeMuseError::service(format!("Recipe service returned no choices for {what}"))
        })?;
        let raw = choice.message.content.text();
        let json = strip_code_fence(&raw);

        serde_json::from_str(json).map_err(|e| {
            RecipeMuseError::service(format!("Failed to read {what} from the model reply: {e}"))
        })
    }
}

/// Models sometimes wrap JSON in a markdown fence despite being asked not to.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn json_object_format() -> Option<serde_json::Value> {
    Some(serde_json::json!({"type": "json_object"}))
}

#[async_trait]
impl GenerationService for ModelGenerationService {
    async fn identify_ingredients(
        &self,
        encoded_image: &str,
        mime_type: &str,
    ) -> Result<Vec<String>> {
        tracing::info!("Identifying ingredients in a {} image", mime_type);

        let system_message = ChatMessage::system(
            r#"You identify food ingredients in photos. List every distinct edible ingredient you can see, using short common names (for example "tomato", "red onion", "chicken breast"). Ignore containers, utensils and packaging.
Return a JSON object of the form {"ingredients": ["name", ...]}. If you cannot see any ingredients, return {"ingredients": []}."#,
        );
        let data_uri = format!(
            "data:{};base64,{}",
            mime_type,
            strip_data_uri_prefix(encoded_image)
        );
        let user_message =
            ChatMessage::user_with_image("Which ingredients are in this photo?", data_uri);

        let request = ChatRequest {
            model: self.vision_model.clone(),
            messages: vec![system_message, user_message],
            temperature: 0.0,
            max_tokens: self.max_tokens,
            response_format: json_object_format(),
        };

        let identified: IdentifiedIngredients = self.chat_json(request, "ingredients").await?;
        let names: Vec<String> = identified
            .ingredients
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        tracing::info!("Identified {} ingredients", names.len());
        Ok(names)
    }

    async fn generate_recipes(&self, ingredients: &[String]) -> Result<Vec<Recipe>> {
        tracing::info!(
            "Generating {} recipes from {} ingredients",
            self.recipe_count,
            ingredients.len()
        );

        let system_message = ChatMessage::system(format!(
            r#"You are a creative home cook. Suggest {count} different recipes that make good use of the ingredients the user has. You may assume common pantry staples (salt, pepper, oil, water) are available.
Return a JSON object of the form:
{{
    "recipes": [
        {{
            "name": "string",
            "description": "one or two appetizing sentences",
            "ingredients": ["quantity and ingredient", ...],
            "instructions": ["step", ...]
        }}
    ]
}}"#,
            count = self.recipe_count
        ));
        let user_message = ChatMessage::user(format!("Ingredients: {}", ingredients.join(", ")));

        let request = ChatRequest {
            model: self.text_model.clone(),
            messages: vec![system_message, user_message],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: json_object_format(),
        };

        let generated: GeneratedRecipes = self.chat_json(request, "recipes").await?;
        if generated.recipes.is_empty() {
            return Err(RecipeMuseError::service("No recipes were generated"));
        }

        tracing::info!("Generated {} recipes", generated.recipes.len());
        Ok(generated.recipes)
    }

    async fn generate_image(&self, recipe: &Recipe) -> Result<RecipeImage> {
        tracing::debug!("Generating image for recipe: {}", recipe.name);

        let request = ImageRequest {
            model: self.image_model.clone(),
            prompt: format!(
                "A professional, appetizing food photograph of {}. {} Natural light, shallow depth of field, no text.",
                recipe.name, recipe.description
            ),
            n: 1,
            size: self.image_size.clone(),
            response_format: "b64_json".to_string(),
        };

        let response = self.tx.create_image(&request).await?;
        let data = response
            .data
            .into_iter()
            .find_map(|datum| datum.b64_json)
            .filter(|data| !data.is_empty())
            .ok_or_else(|| {
                RecipeMuseError::service(format!("No image was returned for {}", recipe.name))
            })?;

        Ok(RecipeImage::new(GENERATED_IMAGE_MIME, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatResponse, Choice, ImageDatum, ImageResponse, MessageContent};
    use std::sync::Mutex;

    // Mock Transport for testing
    #[derive(Default)]
    struct MockTransport {
        chat_responses: Mutex<Vec<Result<ChatResponse>>>,
        image_responses: Mutex<Vec<ImageResponse>>,
        chat_requests: Mutex<Vec<ChatRequest>>,
        image_requests: Mutex<Vec<ImageRequest>>,
    }

    impl MockTransport {
        fn with_chat(content: &str) -> Self {
            let transport = Self::default();
            transport
                .chat_responses
                .lock()
                .expect("Mock transport mutex should not be poisoned")
                .push(Ok(reply(content)));
            transport
        }

        fn with_image(response: ImageResponse) -> Self {
            let transport = Self::default();
            transport
                .image_responses
                .lock()
                .expect("Mock transport mutex should not be poisoned")
                .push(response);
            transport
        }
    }

    fn reply(content: &str) -> ChatResponse {
        ChatResponse {
            choices: vec![Choice {
                message: ChatMessage::assistant(content),
            }],
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
            self.chat_requests
                .lock()
                .expect("Mock transport mutex should not be poisoned")
                .push(req.clone());
            self.chat_responses
                .lock()
                .expect("Mock transport mutex should not be poisoned")
                .pop()
                .unwrap_or_else(|| Err(RecipeMuseError::service("No more mock responses")))
        }

        async fn create_image(&self, req: &ImageRequest) -> Result<ImageResponse> {
            self.image_requests
                .lock()
                .expect("Mock transport mutex should not be poisoned")
                .push(req.clone());
            self.image_responses
                .lock()
                .expect("Mock transport mutex should not be poisoned")
                .pop()
                .ok_or_else(|| RecipeMuseError::service("No more mock responses"))
        }
    }

    fn service_with(transport: Arc<MockTransport>) -> ModelGenerationService {
        let cfg = ServiceConfig {
            text_model: "text-model".to_string(),
            vision_model: "vision-model".to_string(),
            image_model: "image-model".to_string(),
            ..ServiceConfig::default()
        };
        ModelGenerationService::new(transport, &cfg)
    }

    fn sample_recipe() -> Recipe {
        Recipe {
            name: "Chicken Fried Rice".to_string(),
            description: "Savory and quick.".to_string(),
            ingredients: vec!["Chicken".to_string(), "Rice".to_string()],
            instructions: vec!["Cook.".to_string()],
            image: None,
        }
    }

    #[tokio::test]
    async fn test_identify_sends_image_and_parses_names() {
        let transport = Arc::new(MockTransport::with_chat(
            r#"{"ingredients": ["tomato", "  ", "Onion "]}"#,
        ));
        let service = service_with(transport.clone());

        let names = service
            .identify_ingredients("data:image/jpeg;base64,QUJD", "image/jpeg")
            .await
            .expect("identification should succeed");
        assert_eq!(names, vec!["tomato", "Onion"]);

        let requests = transport.chat_requests.lock().unwrap();
        assert_eq!(requests[0].model, "vision-model");
        match &requests[0].messages[1].content {
            MessageContent::Parts(parts) => {
                let json = serde_json::to_value(parts).unwrap();
                // The prefix must not be doubled when the caller already sent a data URI
                assert_eq!(json[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
            }
            other => panic!("expected multi-part content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_recipes_parses_fenced_json() {
        let transport = Arc::new(MockTransport::with_chat(
            "```json\n{\"recipes\": [{\"name\": \"Fried Rice\", \"description\": \"Fast.\", \"ingredients\": [\"Rice\"], \"instructions\": [\"Fry.\"]}]}\n```",
        ));
        let service = service_with(transport.clone());

        let recipes = service
            .generate_recipes(&["Rice".to_string(), "Egg".to_string()])
            .await
            .expect("generation should succeed");
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].name, "Fried Rice");
        assert!(recipes[0].image.is_none());

        let requests = transport.chat_requests.lock().unwrap();
        assert_eq!(requests[0].model, "text-model");
        assert!(requests[0].messages[1].content.text().contains("Rice, Egg"));
    }

    #[tokio::test]
    async fn test_empty_recipe_list_is_an_error() {
        let transport = Arc::new(MockTransport::with_chat(r#"{"recipes": []}"#));
        let service = service_with(transport);

        let err = service
            .generate_recipes(&["Rice".to_string()])
            .await
            .expect_err("empty list should fail");
        assert_eq!(err.user_message(), "No recipes were generated");
    }

    #[tokio::test]
    async fn test_malformed_recipe_is_an_error() {
        let transport = Arc::new(MockTransport::with_chat(
            r#"{"recipes": [{"name": "Mystery"}]}"#,
        ));
        let service = service_with(transport);

        let err = service
            .generate_recipes(&["Rice".to_string()])
            .await
            .expect_err("missing fields should fail");
        assert!(matches!(err, RecipeMuseError::Service(_)));
        assert!(err.to_string().contains("recipes"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let transport = Arc::new(MockTransport::default());
        transport
            .chat_responses
            .lock()
            .unwrap()
            .push(Ok(ChatResponse { choices: vec![] }));
        let service = service_with(transport);

        let err = service
            .generate_recipes(&["Rice".to_string()])
            .await
            .expect_err("no choices should fail");
        assert!(err.to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn test_generate_image_returns_payload() {
        let transport = Arc::new(MockTransport::with_image(ImageResponse {
            data: vec![ImageDatum {
                b64_json: Some("iVBORw0KGgo=".to_string()),
            }],
        }));
        let service = service_with(transport.clone());

        let image = service
            .generate_image(&sample_recipe())
            .await
            .expect("image should be generated");
        assert_eq!(image, RecipeImage::new("image/png", "iVBORw0KGgo="));

        let requests = transport.image_requests.lock().unwrap();
        assert_eq!(requests[0].model, "image-model");
        assert!(requests[0].prompt.contains("Chicken Fried Rice"));
        assert_eq!(requests[0].response_format, "b64_json");
    }

    #[tokio::test]
    async fn test_generate_image_without_data_is_an_error() {
        let transport = Arc::new(MockTransport::with_image(ImageResponse { data: vec![] }));
        let service = service_with(transport);

        let err = service
            .generate_image(&sample_recipe())
            .await
            .expect_err("empty data should fail");
        assert!(err.to_string().contains("Chicken Fried Rice"));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{\"a\": 1}```"), "{\"a\": 1}");
    }
}
