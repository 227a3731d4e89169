/*!
# funcapp-health devkit

Test support for the health pipeline without an Azure subscription:
- in-memory stand-in for the Azure CLI client
- fixtures for apps, plans and metric series
- a harness that runs one pass and emits the report to a temp directory
*/

pub mod az_stub;
pub mod fixtures;
pub mod test_utils;

pub use az_stub::MockAzureClient;
pub use test_utils::TestHarness;
