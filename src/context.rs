// Application context shared by every event handler

use time::OffsetDateTime;

use crate::bot::delivery::Delivery;
use crate::bot::prompts::PromptRegistry;
use crate::config::Settings;
use crate::downloader::Pipeline;

pub struct AppContext {
    pub settings: Settings,
    pub started_at: OffsetDateTime,
    pub pipeline: Pipeline,
    pub prompts: PromptRegistry,
    pub delivery: Delivery,
}

impl AppContext {
    pub fn new(settings: Settings, pipeline: Pipeline) -> Self {
        let delivery = Delivery::new(settings.retention, settings.upload_limit_bytes);
        Self {
            settings,
            started_at: OffsetDateTime::now_utc(),
            pipeline,
            prompts: PromptRegistry::new(),
            delivery,
        }
    }

    pub fn is_owner(&self, user_id: u64) -> bool {
        self.settings.owner_id == Some(user_id)
    }
}
