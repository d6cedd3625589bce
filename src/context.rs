//! Process-wide application context: one instance of every remote
//! adapter plus the state store, built once from [`AppConfig`] and
//! shared (via `Arc`) across every HTTP handler.

use crate::config::AppConfig;
use crate::remote::{ChartHopClient, RunnClient, TeamtailorClient, Transport, WarehouseClient};
use crate::state::StateStore;

pub struct AppContext {
    pub config: AppConfig,
    pub charthop: ChartHopClient,
    pub teamtailor: TeamtailorClient,
    pub runn: RunnClient,
    pub warehouse: WarehouseClient,
    pub task_queue: Transport<crate::config::TaskQueueConfig>,
    pub store: StateStore,
}

impl AppContext {
    pub fn new(config: AppConfig, store: StateStore) -> Self {
        let charthop = ChartHopClient::new(config.charthop.clone());
        let teamtailor = TeamtailorClient::new(config.teamtailor.clone());
        let runn = RunnClient::new(config.runn.clone());
        let warehouse = WarehouseClient::new(config.warehouse.clone());
        let task_queue = Transport::new(config.task_queue.clone());

        Self {
            config,
            charthop,
            teamtailor,
            runn,
            warehouse,
            task_queue,
            store,
        }
    }
}
