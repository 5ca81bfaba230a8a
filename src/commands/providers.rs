//! Providers command handler: list providers with their capabilities.

use super::Context;

pub fn run_providers_command(mut context: Context) {
    for (position, (name, capabilities)) in context.registry.capabilities().into_iter().enumerate() {
        println!("{:>2}. {name:<18} {}", position + 1, capabilities.labels().join(", "));
    }
}
