//! End-to-end tests for the decision engine.
//!
//! These wire controllers, registries, stores and the sync hub together the
//! way a host would, and check learning outcomes across them.

#![cfg(test)]

use crate::prelude::*;
use skirmish_common::{EntityId, EntityTypeId};
use std::sync::Arc;

fn greedy_config() -> BrainConfig {
    let mut config = BrainConfig::default();
    config.learning.epsilon = 0.0;
    config.learning.min_epsilon = 0.0;
    config
}

fn spawn(registry: &Arc<KnowledgeRegistry>, entity_type: &str) -> DecisionController {
    DecisionController::attach(
        EntityId::new(),
        EntityTypeId::new(entity_type),
        registry,
        ControllerConfig::default(),
    )
}

/// Tests for entities of one type learning through a shared table
mod shared_learning_tests {
    use super::*;

    #[test]
    fn e2e_update_visible_to_sibling_next_tick() {
        let registry = Arc::new(KnowledgeRegistry::new(
            greedy_config(),
            Box::new(MemoryStore::new()),
        ));
        let mut world = ScriptedWorld::new();
        let mut first = spawn(&registry, "grunt");
        let mut second = spawn(&registry, "grunt");

        let far = Perception::hostile(250.0, 0.0).with_own_health(60.0);
        let hurt = Perception::hostile(250.0, 0.0).with_own_health(20.0);
        world.set_perception(first.entity(), far);
        world.set_perception(second.entity(), far);

        // Aggressive wins the all-zero tie, then gets punished for losing health
        assert_eq!(first.tick(0.0, &mut world), Some(CombatAction::Aggressive));
        world.set_perception(first.entity(), hurt);
        first.tick(1.0, &mut world);

        let q = first
            .agent()
            .lock()
            .q_value(&encode_state(&far), CombatAction::Aggressive);
        assert!(q < 0.0);

        // The sibling sees the same state and now avoids the punished action
        assert_eq!(second.tick(1.0, &mut world), Some(CombatAction::Cautious));
    }

    #[test]
    fn e2e_types_learn_independently() {
        let registry = Arc::new(KnowledgeRegistry::new(
            greedy_config(),
            Box::new(MemoryStore::new()),
        ));
        let mut world = ScriptedWorld::new();
        let mut grunt = spawn(&registry, "grunt");
        let mut archer = spawn(&registry, "archer");

        let p = Perception::hostile(250.0, 0.0);
        world.set_perception(grunt.entity(), p);
        world.set_perception(archer.entity(), p);

        grunt.tick(0.0, &mut world);
        world.set_perception(grunt.entity(), p.with_own_health(10.0));
        grunt.tick(1.0, &mut world);
        grunt.on_death(None);

        let grunt_stats = registry
            .agent_stats(&EntityTypeId::new("grunt"))
            .expect("grunt agent");
        let archer_stats = registry
            .agent_stats(&EntityTypeId::new("archer"))
            .expect("archer agent");
        assert_eq!(grunt_stats.episode_count, 1);
        assert!(grunt_stats.update_count >= 2);
        assert_eq!(archer_stats.episode_count, 0);
        assert_eq!(archer_stats.state_count, 0);

        assert_eq!(archer.tick(0.0, &mut world), Some(CombatAction::Aggressive));
    }

    #[test]
    fn e2e_respawn_keeps_type_knowledge() {
        let registry = Arc::new(KnowledgeRegistry::new(
            greedy_config(),
            Box::new(MemoryStore::new()),
        ));
        let mut world = ScriptedWorld::new();
        let p = Perception::hostile(90.0, 2.0);

        for life in 0..3 {
            let mut controller = spawn(&registry, "grunt");
            world.set_perception(controller.entity(), p);
            controller.tick(0.0, &mut world);
            controller.tick(1.0, &mut world);
            assert!(controller.on_death(None));
            controller.destroy();

            let stats = registry
                .agent_stats(&EntityTypeId::new("grunt"))
                .expect("agent");
            assert_eq!(stats.episode_count, life + 1);
        }
    }
}

/// Tests for persistence and cross-instance sync
mod knowledge_sharing_tests {
    use super::*;

    #[test]
    fn e2e_file_store_survives_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let p = Perception::hostile(180.0, 0.5).with_own_health(70.0);
        let state = encode_state(&p);

        let store = FileStore::open(dir.path()).expect("open store");
        let first_run = Arc::new(KnowledgeRegistry::new(greedy_config(), Box::new(store)));
        let mut world = ScriptedWorld::new();
        let mut controller = spawn(&first_run, "grunt");
        world.set_perception(controller.entity(), p);
        controller.tick(0.0, &mut world);
        controller.events().damage_dealt(3.0, TargetKind::PrimaryHostile);
        controller.tick(1.0, &mut world);
        controller.on_death(Some(p.with_own_health(0.0)));
        let learned = controller.agent().lock().save();

        let store = FileStore::open(dir.path()).expect("reopen store");
        let registry = KnowledgeRegistry::new(greedy_config(), Box::new(store));
        let agent = registry.agent_for(&EntityTypeId::new("grunt"));
        let restored = agent.lock().save();

        assert_eq!(restored, learned);
        assert!(agent.lock().contains_state(&state));
    }

    #[test]
    fn e2e_sync_hub_shares_between_registries() {
        let mut hub = SyncHub::new();
        let grunt = EntityTypeId::new("grunt");

        let veteran = Arc::new(
            KnowledgeRegistry::new(greedy_config(), Box::new(MemoryStore::new()))
                .with_sync(Box::new(hub.endpoint())),
        );

        let mut world = ScriptedWorld::new();
        let p = Perception::hostile(45.0, 0.0);
        let mut controller = spawn(&veteran, "grunt");
        world.set_perception(controller.entity(), p);
        controller.tick(0.0, &mut world);
        controller.events().damage_dealt(20.0, TargetKind::PrimaryHostile);
        controller.tick(1.0, &mut world);
        controller.on_death(None);
        hub.pump();

        // A rookie instance joining later asks for the shared table
        let rookie = Arc::new(
            KnowledgeRegistry::new(BrainConfig::default(), Box::new(MemoryStore::new()))
                .with_sync(Box::new(hub.endpoint())),
        );
        let mut recruit = spawn(&rookie, "grunt");
        hub.pump();
        assert_eq!(rookie.pump_sync(), 1);

        let veteran_q = veteran
            .agent_for(&grunt)
            .lock()
            .q_value(&encode_state(&p), CombatAction::Aggressive);
        let rookie_agent = rookie.agent_for(&grunt);
        let rookie_q = rookie_agent
            .lock()
            .q_value(&encode_state(&p), CombatAction::Aggressive);
        assert!(veteran_q > 0.0);
        assert_eq!(rookie_q, veteran_q);

        // ε adopted from the greedier veteran
        assert_eq!(rookie_agent.lock().epsilon(), 0.0);

        // A late delivery after the recruit is gone only touches the table
        recruit.destroy();
        controller.destroy();
        veteran.flush(&grunt);
        hub.pump();
        assert_eq!(rookie.pump_sync(), 1);
        assert!(recruit.last_state().is_none());
        assert_eq!(rookie.agent_stats(&grunt).map(|s| s.episode_count), Some(0));
    }
}
