use serde::{Deserialize, Serialize};

use flagplane_core::{Aggregate, AggregateId, AggregateRoot};

use crate::account::{Account, AccountCommand, AccountEvent};

/// Aggregate root: AdminAccount.
///
/// Same state machine as [`Account`], stored in the global scope. Its role
/// applies to every environment of every enabled project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdminAccount(Account);

impl AdminAccount {
    pub fn empty(email: &str) -> Self {
        Self(Account::empty(email))
    }

    pub fn account(&self) -> &Account {
        &self.0
    }

    pub fn into_account(self) -> Account {
        self.0
    }
}

impl core::ops::Deref for AdminAccount {
    type Target = Account;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AggregateRoot for AdminAccount {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        self.0.id()
    }

    fn version(&self) -> u64 {
        self.0.version()
    }
}

impl Aggregate for AdminAccount {
    const AGGREGATE_TYPE: &'static str = "admin_account";

    type Command = AccountCommand;
    type Event = AccountEvent;
    type Error = <Account as Aggregate>::Error;

    fn apply(&mut self, event: &Self::Event) {
        self.0.apply(event);
    }

    fn handle(&self, command: &Self::Command) -> Result<Self::Event, Self::Error> {
        self.0.handle(command)
    }
}
