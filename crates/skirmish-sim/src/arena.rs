//! Headless training arena.
//!
//! A scripted opponent chases the nearest fighter around a square arena and
//! hits it when in reach. Fighters are driven by decision controllers sharing one
//! knowledge registry; a fighter that drops to zero health dies, closing its
//! episode, and a fresh one respawns at the arena edge.

use crate::config::{ArenaConfig, SimConfig};
use glam::Vec2;
use skirmish_brain::{
    CombatEventSender, CombatWorld, ControllerConfig, DecisionController, Effect,
    KnowledgeRegistry, Perception, SkillKind, TargetKind,
};
use skirmish_common::{bearing, distance, EntityId, EntityTypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Body of a learning fighter.
#[derive(Debug, Clone)]
struct Fighter {
    position: Vec2,
    velocity: Vec2,
    health: f32,
    events: CombatEventSender,
}

/// The scripted opponent.
#[derive(Debug, Clone)]
struct Opponent {
    position: Vec2,
    waypoint: Vec2,
    health: f32,
    cooldown: f32,
}

/// Physical state of the arena, the world seen by controllers.
#[derive(Debug)]
pub struct ArenaWorld {
    config: ArenaConfig,
    fighters: HashMap<EntityId, Fighter>,
    opponent: Opponent,
    rng: fastrand::Rng,
    opponent_defeats: u32,
}

impl ArenaWorld {
    fn new(config: ArenaConfig, mut rng: fastrand::Rng) -> Self {
        let center = Vec2::splat(config.size * 0.5);
        let waypoint = random_point(&mut rng, config.size);
        Self {
            opponent: Opponent {
                position: center,
                waypoint,
                health: config.opponent_health,
                cooldown: 0.0,
            },
            config,
            fighters: HashMap::new(),
            rng,
            opponent_defeats: 0,
        }
    }

    fn spawn_fighter(&mut self, entity: EntityId, events: CombatEventSender) {
        let position = self.edge_point();
        self.fighters.insert(
            entity,
            Fighter {
                position,
                velocity: Vec2::ZERO,
                health: 100.0,
                events,
            },
        );
    }

    fn edge_point(&mut self) -> Vec2 {
        let size = self.config.size;
        let along = self.rng.f32() * size;
        match self.rng.u8(..4) {
            0 => Vec2::new(along, 0.0),
            1 => Vec2::new(along, size),
            2 => Vec2::new(0.0, along),
            _ => Vec2::new(size, along),
        }
    }

    fn nearby_allies(&self, entity: EntityId, position: Vec2) -> u32 {
        self.fighters
            .iter()
            .filter(|(id, other)| {
                **id != entity && distance(position, other.position) <= self.config.ally_radius
            })
            .count() as u32
    }

    /// Moves bodies and runs the opponent for one step.
    fn advance(&mut self, dt: f32) {
        let size = self.config.size;
        for fighter in self.fighters.values_mut() {
            let next = fighter.position + fighter.velocity * dt;
            fighter.position = next.clamp(Vec2::ZERO, Vec2::splat(size));
        }

        let target = self
            .fighters
            .values()
            .map(|f| f.position)
            .min_by(|a, b| {
                let from = self.opponent.position;
                distance(from, *a).total_cmp(&distance(from, *b))
            });

        // Chase the nearest fighter, otherwise wander between waypoints
        let goal = match target {
            Some(position) => position,
            None => {
                if distance(self.opponent.position, self.opponent.waypoint) < 5.0 {
                    self.opponent.waypoint = random_point(&mut self.rng, size);
                }
                self.opponent.waypoint
            },
        };
        let max_step = self.config.opponent_speed * dt;
        let step = (goal - self.opponent.position).clamp_length_max(max_step);
        self.opponent.position += step;

        self.opponent.cooldown = (self.opponent.cooldown - dt).max(0.0);
        if self.opponent.cooldown > 0.0 {
            return;
        }

        let reach = self.config.opponent_range;
        let from = self.opponent.position;
        let victim = self
            .fighters
            .values_mut()
            .filter(|f| distance(from, f.position) <= reach)
            .min_by(|a, b| distance(from, a.position).total_cmp(&distance(from, b.position)));
        if let Some(fighter) = victim {
            fighter.health = (fighter.health - self.config.opponent_damage).max(0.0);
            self.opponent.cooldown = self.config.opponent_cooldown;
        }
    }

    fn strike(&mut self, entity: EntityId) {
        let Some(fighter) = self.fighters.get(&entity) else {
            return;
        };
        if distance(fighter.position, self.opponent.position) > self.config.strike_range {
            return;
        }

        let dealt = self.config.strike_damage.min(self.opponent.health);
        self.opponent.health -= dealt;
        fighter.events.damage_dealt(dealt, TargetKind::PrimaryHostile);

        if self.opponent.health <= 0.0 {
            self.opponent_defeats += 1;
            info!(defeats = self.opponent_defeats, "Opponent defeated");
            self.opponent.health = self.config.opponent_health;
            self.opponent.position = Vec2::splat(self.config.size * 0.5);
        }
    }

    fn heal(&mut self, entity: EntityId) {
        let amount = self.config.heal_amount;
        if let Some(fighter) = self.fighters.get_mut(&entity) {
            let healed = amount.min(100.0 - fighter.health);
            fighter.health += healed;
            if healed > 0.0 {
                fighter.events.heal_applied(healed);
            }
        }
    }

    fn dead_fighters(&self) -> Vec<EntityId> {
        let mut dead: Vec<_> = self
            .fighters
            .iter()
            .filter(|(_, f)| f.health <= 0.0)
            .map(|(id, _)| *id)
            .collect();
        dead.sort_by_key(|id| id.raw());
        dead
    }
}

impl CombatWorld for ArenaWorld {
    fn perceive(&self, entity: EntityId) -> Option<Perception> {
        let fighter = self.fighters.get(&entity)?;
        Some(Perception {
            distance: distance(fighter.position, self.opponent.position),
            angle: bearing(fighter.position, self.opponent.position),
            own_health_pct: fighter.health,
            target_health_pct: self.opponent.health / self.config.opponent_health * 100.0,
            is_hostile_primary: true,
            nearby_ally_count: self.nearby_allies(entity, fighter.position),
        })
    }

    fn apply_effect(&mut self, entity: EntityId, effect: Effect) {
        let speed = self.config.fighter_speed;
        match effect {
            Effect::Move(direction) => {
                if let Some(fighter) = self.fighters.get_mut(&entity) {
                    fighter.velocity = direction * speed;
                }
            },
            Effect::Hold | Effect::Skill(SkillKind::Buff) => {
                if let Some(fighter) = self.fighters.get_mut(&entity) {
                    fighter.velocity = Vec2::ZERO;
                }
            },
            Effect::Skill(SkillKind::Strike) => self.strike(entity),
            Effect::Skill(SkillKind::Heal) => self.heal(entity),
        }
    }
}

fn random_point(rng: &mut fastrand::Rng, size: f32) -> Vec2 {
    Vec2::new(rng.f32() * size, rng.f32() * size)
}

/// Totals of a simulation run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimReport {
    /// Fighter deaths (closed episodes)
    pub episodes: u32,
    /// Times the opponent was brought down
    pub opponent_defeats: u32,
    /// Simulated seconds
    pub sim_secs: f64,
    /// Decisions made across all fighters
    pub decisions: u64,
}

/// Fighters, their controllers and the world they act in.
pub struct Arena {
    world: ArenaWorld,
    controllers: Vec<DecisionController>,
    registry: Arc<KnowledgeRegistry>,
    entity_type: EntityTypeId,
    controller_config: ControllerConfig,
    now: f64,
    report: SimReport,
}

impl Arena {
    /// Builds the arena and spawns the initial fighters.
    pub fn new(config: &SimConfig, registry: Arc<KnowledgeRegistry>) -> Self {
        let rng = config.seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        let mut arena = Self {
            world: ArenaWorld::new(config.arena.clone(), rng),
            controllers: Vec::new(),
            controller_config: config.brain.controller.clone(),
            entity_type: EntityTypeId::new(config.entity_type.as_str()),
            registry,
            now: 0.0,
            report: SimReport::default(),
        };
        for _ in 0..config.arena.fighters {
            arena.spawn();
        }
        arena
    }

    fn spawn(&mut self) {
        let entity = EntityId::new();
        let controller = DecisionController::attach(
            entity,
            self.entity_type.clone(),
            &self.registry,
            self.controller_config.clone(),
        );
        self.world.spawn_fighter(entity, controller.events());
        self.controllers.push(controller);
    }

    /// Advances the simulation by one step.
    pub fn step(&mut self) {
        let dt = self.world.config.step_secs;
        self.now += f64::from(dt);

        for controller in &mut self.controllers {
            if controller.tick(self.now, &mut self.world).is_some() {
                self.report.decisions += 1;
            }
        }
        self.world.advance(dt);

        for entity in self.world.dead_fighters() {
            let terminal = self.world.perceive(entity);
            if let Some(index) = self.controllers.iter().position(|c| c.entity() == entity) {
                let mut controller = self.controllers.swap_remove(index);
                controller.on_death(terminal);
                controller.destroy();
            }
            self.world.fighters.remove(&entity);
            self.report.episodes += 1;

            if let Some(stats) = self.registry.agent_stats(&self.entity_type) {
                info!(
                    episode = self.report.episodes,
                    states = stats.state_count,
                    epsilon = format_args!("{:.3}", stats.epsilon),
                    total_reward = format_args!("{:.1}", stats.total_reward),
                    "Fighter died at t={:.1}s",
                    self.now
                );
            }
            self.spawn();
        }

        self.report.opponent_defeats = self.world.opponent_defeats;
        self.report.sim_secs = self.now;
    }

    /// Runs until `episodes` deaths or `max_sim_secs` of simulated time.
    pub fn run(&mut self, episodes: u32, max_sim_secs: f64) -> SimReport {
        while self.report.episodes < episodes && self.now < max_sim_secs {
            self.step();
        }
        debug!(report = ?self.report, "Simulation finished");
        self.report
    }

    /// Living fighters.
    pub fn fighter_count(&self) -> usize {
        self.controllers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_brain::MemoryStore;

    fn seeded_config() -> SimConfig {
        SimConfig {
            seed: Some(7),
            ..SimConfig::default()
        }
    }

    fn registry(config: &SimConfig) -> Arc<KnowledgeRegistry> {
        Arc::new(
            KnowledgeRegistry::new(config.brain.clone(), Box::new(MemoryStore::new()))
                .with_seed(config.seed.unwrap_or_default()),
        )
    }

    #[test]
    fn test_spawns_configured_fighters() {
        let config = seeded_config();
        let arena = Arena::new(&config, registry(&config));
        assert_eq!(arena.fighter_count(), config.arena.fighters as usize);
    }

    #[test]
    fn test_perception_matches_geometry() {
        let mut world = ArenaWorld::new(ArenaConfig::default(), fastrand::Rng::with_seed(1));
        let (sender, _receiver) = skirmish_brain::event_channel(4);
        let a = EntityId::new();
        world.spawn_fighter(a, sender.clone());
        world.opponent.position = Vec2::new(100.0, 0.0);
        if let Some(f) = world.fighters.get_mut(&a) {
            f.position = Vec2::new(0.0, 0.0);
        }

        let p = world.perceive(a).expect("fighter exists");
        assert!((p.distance - 100.0).abs() < 1e-4);
        assert!(p.angle.abs() < 1e-6);
        assert_eq!(p.nearby_ally_count, 0);
        assert_eq!(p.target_health_pct, 100.0);

        let b = EntityId::new();
        world.spawn_fighter(b, sender);
        if let Some(f) = world.fighters.get_mut(&b) {
            f.position = Vec2::new(10.0, 0.0);
        }
        assert_eq!(world.perceive(a).map(|p| p.nearby_ally_count), Some(1));
    }

    #[test]
    fn test_strike_reports_damage_in_range_only() {
        let mut world = ArenaWorld::new(ArenaConfig::default(), fastrand::Rng::with_seed(1));
        let (sender, receiver) = skirmish_brain::event_channel(4);
        let a = EntityId::new();
        world.spawn_fighter(a, sender);
        world.opponent.position = Vec2::new(400.0, 400.0);

        if let Some(f) = world.fighters.get_mut(&a) {
            f.position = Vec2::new(0.0, 0.0);
        }
        world.apply_effect(a, Effect::Skill(SkillKind::Strike));
        assert_eq!(receiver.pending_count(), 0);

        if let Some(f) = world.fighters.get_mut(&a) {
            f.position = Vec2::new(380.0, 400.0);
        }
        world.apply_effect(a, Effect::Skill(SkillKind::Strike));
        assert_eq!(receiver.pending_count(), 1);
        assert_eq!(world.opponent.health, 400.0 - 12.0);
    }

    #[test]
    fn test_heal_is_capped() {
        let mut world = ArenaWorld::new(ArenaConfig::default(), fastrand::Rng::with_seed(1));
        let (sender, receiver) = skirmish_brain::event_channel(4);
        let a = EntityId::new();
        world.spawn_fighter(a, sender);

        world.apply_effect(a, Effect::Skill(SkillKind::Heal));
        assert_eq!(receiver.pending_count(), 0);

        if let Some(f) = world.fighters.get_mut(&a) {
            f.health = 90.0;
        }
        world.apply_effect(a, Effect::Skill(SkillKind::Heal));
        let mut batch = skirmish_brain::EventBatch::default();
        receiver.drain_into(&mut batch);
        assert_eq!(batch.hp_healed, 10.0);
    }

    #[test]
    fn test_run_closes_episodes_and_respawns() {
        let mut config = seeded_config();
        config.arena.opponent_damage = 50.0;
        config.arena.opponent_cooldown = 0.1;
        config.arena.fighters = 2;
        let registry = registry(&config);

        let mut arena = Arena::new(&config, Arc::clone(&registry));
        let report = arena.run(4, 3_600.0);

        assert!(report.episodes >= 4);
        assert!(report.decisions > 0);
        assert_eq!(arena.fighter_count(), 2);

        let stats = registry
            .agent_stats(&EntityTypeId::new("grunt"))
            .expect("agent");
        assert_eq!(u64::from(report.episodes), stats.episode_count);
        assert!(stats.state_count > 0);
    }

    #[test]
    fn test_run_respects_time_limit() {
        let mut config = seeded_config();
        config.arena.opponent_damage = 0.0;
        let mut arena = Arena::new(&config, registry(&config));

        let report = arena.run(10, 5.0);
        assert_eq!(report.episodes, 0);
        assert!(report.sim_secs >= 5.0);
        assert!(report.sim_secs < 5.0 + f64::from(config.arena.step_secs) + 1e-9);
    }
}
