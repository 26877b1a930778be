use log::info;

mod blockchain;

use blockchain::{Blockchain, Keypair, Transaction};

fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Identities for the demo: the miner keeps its key, the recipient only
    // needs an address.
    let miner = Keypair::generate();
    info!("Miner address: {}", miner.address());
    info!(
        "Miner secret key: {}",
        hex::encode(miner.export_secret_bytes())
    );

    let recipient = Keypair::generate();

    let ledger = Blockchain::new();

    let mut tx = Transaction::new(miner.address().clone(), recipient.address().clone(), 10.0);
    tx.sign(&miner).expect("the miner owns the sender address");
    ledger
        .add_transaction(tx)
        .expect("a signed transfer is accepted");

    info!("Starting the miner...");
    ledger.mine_pending_transactions(miner.address());

    info!(
        "Miner balance: {}",
        ledger.get_balance_of_address(miner.address())
    );
    info!(
        "Recipient balance: {}",
        ledger.get_balance_of_address(recipient.address())
    );
    info!("Chain valid: {}", ledger.is_valid());
}
