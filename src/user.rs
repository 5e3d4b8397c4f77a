//! UserController: start/switch/stop/lock of logical users (§4.G).

use std::collections::VecDeque;

use crate::error::{Result, SupervisorError};
use crate::ids::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserState {
    Booting,
    RunningLocked,
    Running,
    Stopping,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOpError {
    Ok,
    RelatedUsersCannotStop,
    Invalid,
}

#[derive(Debug)]
pub struct UserRecord {
    pub id: UserId,
    pub state: UserState,
    pub unlocked: bool,
    pub initializing: bool,
    pub switching: bool,
    pub ephemeral: bool,
    /// §11: group of users a profile belongs to; equal to `id` for a
    /// non-profile (primary) user.
    pub profile_group: UserId,
    /// Remembered so STOPPING can revert if a new start arrives before
    /// the shutdown broadcast completes (§4.G).
    pub prior_state_before_stopping: Option<UserState>,
}

impl UserRecord {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            state: UserState::Booting,
            unlocked: false,
            initializing: true,
            switching: false,
            ephemeral: false,
            profile_group: id,
            prior_state_before_stopping: None,
        }
    }
}

pub struct UserController {
    pub users: Vec<UserRecord>,
    /// Least-recently-used order of currently-running users, oldest
    /// first. Only users with state in {BOOTING, RUNNING_LOCKED,
    /// RUNNING} participate (§4.G, §8.1 #6).
    pub running_lru: VecDeque<UserId>,
    pub current_user: UserId,
    pub max_running_users: usize,
}

impl UserController {
    pub fn new(max_running_users: usize) -> Self {
        let system = UserRecord {
            state: UserState::Running,
            unlocked: true,
            initializing: false,
            ..UserRecord::new(UserId::SYSTEM)
        };
        Self {
            users: vec![system],
            running_lru: VecDeque::from([UserId::SYSTEM]),
            current_user: UserId::SYSTEM,
            max_running_users,
        }
    }

    pub fn get(&self, id: UserId) -> Result<&UserRecord> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or(SupervisorError::UnknownUser(id))
    }

    pub fn get_mut(&mut self, id: UserId) -> Result<&mut UserRecord> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(SupervisorError::UnknownUser(id))
    }

    fn is_running_state(state: UserState) -> bool {
        matches!(
            state,
            UserState::Booting | UserState::RunningLocked | UserState::Running
        )
    }

    pub fn running_count(&self) -> usize {
        self.users
            .iter()
            .filter(|u| Self::is_running_state(u.state))
            .count()
    }

    /// Start (or no-op resume of) `id`. Restart from SHUTDOWN re-enters
    /// BOOTING; restart from STOPPING reverts to the prior state if it
    /// arrives before the shutdown broadcast completes (§4.G).
    ///
    /// "Starting an already-current user (no-op) returns success
    /// without state change" (§8 idempotence law).
    pub fn start_user(&mut self, id: UserId) -> Result<Vec<UserId>> {
        if id == self.current_user {
            if let Ok(user) = self.get(id) {
                if Self::is_running_state(user.state) {
                    return Ok(Vec::new());
                }
            }
        }

        if !self.users.iter().any(|u| u.id == id) {
            self.users.push(UserRecord::new(id));
        }

        let user = self.get_mut(id)?;
        match user.state {
            UserState::Shutdown => user.state = UserState::Booting,
            UserState::Stopping => {
                user.state = user.prior_state_before_stopping.unwrap_or(UserState::Booting);
                user.prior_state_before_stopping = None;
            }
            UserState::Running | UserState::RunningLocked | UserState::Booting => {}
        }

        self.running_lru.retain(|u| *u != id);
        self.running_lru.push_back(id);

        self.evict_lru_beyond_capacity()
    }

    /// Eligible-for-eviction users beyond `max_running_users`, oldest
    /// first, excluding the system user and the current user (§4.G).
    /// Returns the ids that were stopped so the caller can tear down
    /// their processes/activities.
    fn evict_lru_beyond_capacity(&mut self) -> Result<Vec<UserId>> {
        let mut evicted = Vec::new();
        while self.running_count() > self.max_running_users {
            let victim = self
                .running_lru
                .iter()
                .copied()
                .find(|id| *id != UserId::SYSTEM && *id != self.current_user);
            match victim {
                Some(id) => {
                    self.begin_stop(id, false)?;
                    evicted.push(id);
                }
                None => break,
            }
        }
        Ok(evicted)
    }

    /// `unlock_user_key` success path: RUNNING_LOCKED -> RUNNING (§4.G).
    pub fn unlock(&mut self, id: UserId) -> Result<()> {
        let user = self.get_mut(id)?;
        if user.state == UserState::RunningLocked {
            user.state = UserState::Running;
        }
        user.unlocked = true;
        Ok(())
    }

    /// Begin the two-phase shutdown protocol (§4.G). `force` bypasses
    /// the related-users-cannot-stop check but still refuses to touch
    /// the system or current user.
    pub fn begin_stop(&mut self, id: UserId, force: bool) -> Result<UserOpError> {
        if id == UserId::SYSTEM || id == self.current_user {
            return Ok(UserOpError::Invalid);
        }

        if !force {
            let group = self.get(id)?.profile_group;
            let related_blocked = self.users.iter().any(|u| {
                u.profile_group == group
                    && Self::is_running_state(u.state)
                    && (u.id == UserId::SYSTEM || u.id == self.current_user)
                    && u.id != id
            });
            if related_blocked {
                return Ok(UserOpError::RelatedUsersCannotStop);
            }
        }

        let group = self.get(id)?.profile_group;
        let related: Vec<UserId> = self
            .users
            .iter()
            .filter(|u| u.profile_group == group && Self::is_running_state(u.state))
            .map(|u| u.id)
            .collect();

        for rel in related {
            if rel == UserId::SYSTEM || rel == self.current_user {
                continue;
            }
            let user = self.get_mut(rel)?;
            user.prior_state_before_stopping = Some(user.state);
            user.state = UserState::Stopping;
        }

        Ok(UserOpError::Ok)
    }

    /// Phase 1 delivery completion: STOPPING -> SHUTDOWN (§4.G).
    pub fn on_stopping_broadcast_complete(&mut self, id: UserId) -> Result<()> {
        let user = self.get_mut(id)?;
        if user.state == UserState::Stopping {
            user.state = UserState::Shutdown;
        }
        Ok(())
    }

    /// Phase 2 delivery completion: `finish_user_stop` removes LRU/
    /// user-state records; ephemeral users are deleted at this point
    /// (§4.G).
    pub fn finish_user_stop(&mut self, id: UserId) {
        self.running_lru.retain(|u| *u != id);
        if let Ok(user) = self.get(id) {
            if user.ephemeral {
                self.users.retain(|u| u.id != id);
            }
        }
    }

    /// Set the switch target and mark it switching; returns the
    /// previous current user so the caller can broadcast
    /// USER_BACKGROUND(old) before USER_FOREGROUND(new) (§4.G, §5).
    pub fn begin_switch(&mut self, target: UserId) -> Result<UserId> {
        let previous = self.current_user;
        if let Ok(user) = self.get_mut(target) {
            user.switching = true;
        }
        self.current_user = target;
        Ok(previous)
    }

    pub fn complete_switch(&mut self, target: UserId) -> Result<()> {
        let user = self.get_mut(target)?;
        user.switching = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_user_starts_running() {
        let controller = UserController::new(3);
        assert_eq!(controller.get(UserId::SYSTEM).unwrap().state, UserState::Running);
    }

    #[test]
    fn starting_current_user_is_a_no_op() {
        let mut controller = UserController::new(3);
        let evicted = controller.start_user(UserId::SYSTEM).unwrap();
        assert!(evicted.is_empty());
    }

    #[test]
    fn bounded_running_evicts_lru_oldest_non_system_non_current() {
        let mut controller = UserController::new(3);
        controller.start_user(UserId(10)).unwrap();
        controller.start_user(UserId(11)).unwrap();
        controller.current_user = UserId(11);
        let evicted = controller.start_user(UserId(12)).unwrap();
        assert_eq!(controller.running_count(), 3);
        assert_eq!(evicted, vec![UserId(10)]);
    }

    #[test]
    fn system_and_current_user_never_evicted() {
        let mut controller = UserController::new(1);
        controller.current_user = UserId::SYSTEM;
        let evicted = controller.start_user(UserId(10)).unwrap();
        // max=1 already satisfied by system alone; starting user 10
        // pushes running_count to 2 > 1, but user 10 *is* eligible
        // (it's neither system nor current), so it gets evicted right
        // back out again rather than leaving the system user touched.
        assert_eq!(evicted, vec![UserId(10)]);
    }

    #[test]
    fn shutdown_protocol_transitions_stopping_then_shutdown() {
        let mut controller = UserController::new(3);
        controller.start_user(UserId(10)).unwrap();
        controller.current_user = UserId::SYSTEM;
        let result = controller.begin_stop(UserId(10), false).unwrap();
        assert_eq!(result, UserOpError::Ok);
        assert_eq!(controller.get(UserId(10)).unwrap().state, UserState::Stopping);
        controller.on_stopping_broadcast_complete(UserId(10)).unwrap();
        assert_eq!(controller.get(UserId(10)).unwrap().state, UserState::Shutdown);
        controller.finish_user_stop(UserId(10));
        assert!(!controller.running_lru.contains(&UserId(10)));
    }

    #[test]
    fn restart_from_stopping_reverts_to_prior_state() {
        let mut controller = UserController::new(3);
        controller.start_user(UserId(10)).unwrap();
        controller.get_mut(UserId(10)).unwrap().state = UserState::Running;
        controller.current_user = UserId::SYSTEM;
        controller.begin_stop(UserId(10), false).unwrap();
        assert_eq!(controller.get(UserId(10)).unwrap().state, UserState::Stopping);
        controller.start_user(UserId(10)).unwrap();
        assert_eq!(controller.get(UserId(10)).unwrap().state, UserState::Running);
    }

    #[test]
    fn cannot_stop_system_or_current_user() {
        let mut controller = UserController::new(3);
        assert_eq!(
            controller.begin_stop(UserId::SYSTEM, false).unwrap(),
            UserOpError::Invalid
        );
        assert_eq!(
            controller.begin_stop(controller.current_user, false).unwrap(),
            UserOpError::Invalid
        );
    }

    #[test]
    fn related_profile_cannot_stop_if_system_or_current_is_related() {
        let mut controller = UserController::new(3);
        controller.start_user(UserId(10)).unwrap();
        controller.start_user(UserId(20)).unwrap();
        controller.get_mut(UserId(20)).unwrap().profile_group = UserId(10);
        controller.current_user = UserId(10);
        let result = controller.begin_stop(UserId(20), false).unwrap();
        assert_eq!(result, UserOpError::RelatedUsersCannotStop);
    }

    #[test]
    fn force_stop_bypasses_related_users_check_but_not_system_current() {
        let mut controller = UserController::new(3);
        controller.start_user(UserId(10)).unwrap();
        controller.current_user = UserId::SYSTEM;
        let result = controller.begin_stop(UserId(10), true).unwrap();
        assert_eq!(result, UserOpError::Ok);
    }

    #[test]
    fn unlock_transitions_running_locked_to_running() {
        let mut controller = UserController::new(3);
        controller.start_user(UserId(10)).unwrap();
        controller.get_mut(UserId(10)).unwrap().state = UserState::RunningLocked;
        controller.unlock(UserId(10)).unwrap();
        assert_eq!(controller.get(UserId(10)).unwrap().state, UserState::Running);
    }
}
