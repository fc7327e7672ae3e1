use confgen::engine::config as core_config;
use confgen::workflows::generate::FilePair;

pub struct AppConfig {
    pub pairs: Vec<FilePair>,
    pub core_config: core_config::ConformerConfig,
}
