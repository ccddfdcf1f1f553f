mod changes;
mod helpers;
mod mocks;
mod orders;
mod payments;
