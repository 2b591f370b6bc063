//! End-to-end commit pass scenarios against the in-memory store.

use num_bigint::{BigInt, BigUint};

use block_committer::pubdata::encode_tx_pub_data;
use block_committer::{BlockCommitter, CommitterConfig, CommitterError};
use rollup_crypto::{concat_keccak_hash, EMPTY_STRING_KECCAK};
use rollup_storage::{
    AccountRepository, BlockRepository, LiquidityRepository, MempoolReader, MemoryStore,
    NftRepository,
};
use rollup_types::{
    AccountStatus, AssetDelta, BalanceDelta, LiquidityDelta, Nft, NftMutation, NftMutationKind,
    NftStatus, PendingTransaction, TxContent, TxDetail, TxStatus,
};
use state_merkle::ChainTrees;

const NOW_MS: i64 = 2_000_000;

fn committer(max_txs_per_block: usize) -> BlockCommitter<MemoryStore> {
    BlockCommitter::new(
        MemoryStore::new(),
        CommitterConfig {
            max_txs_per_block,
            max_commit_interval_ms: 900_000,
        },
    )
}

fn tx(id: u64, content: TxContent) -> PendingTransaction {
    PendingTransaction {
        id,
        content,
        account_index: None,
        nonce: None,
        expired_at_ms: None,
        details: Vec::new(),
        status: TxStatus::Pending,
        block_height: None,
        state_root: None,
        created_at_ms: 0,
    }
}

fn registration(id: u64, account_index: u32, name: &str) -> PendingTransaction {
    tx(
        id,
        TxContent::Registration {
            account_index,
            account_name: name.to_owned(),
            pub_key: vec![account_index as u8 + 1; 32],
        },
    )
}

fn balance_detail(account_index: u32, asset_id: u16, delta: i64, order: u32) -> TxDetail {
    TxDetail {
        asset_id: asset_id as u64,
        account_index: Some(account_index),
        delta: BalanceDelta::General(AssetDelta {
            balance: BigInt::from(delta),
            ..AssetDelta::default()
        }),
        order,
    }
}

fn deposit(id: u64, account_index: u32, asset_id: u16, amount: u64) -> PendingTransaction {
    let mut pending = tx(
        id,
        TxContent::Deposit {
            account_index,
            asset_id,
            amount: BigUint::from(amount),
        },
    );
    pending.account_index = Some(account_index);
    pending.details = vec![balance_detail(account_index, asset_id, amount as i64, 0)];
    pending
}

fn withdraw(
    id: u64,
    account_index: u32,
    nonce: i64,
    asset_id: u16,
    amount: u64,
) -> PendingTransaction {
    let mut pending = tx(
        id,
        TxContent::Withdraw {
            account_index,
            to_address: [0x22; 20],
            asset_id,
            amount: BigUint::from(amount),
            fee_asset_id: asset_id,
            fee: BigUint::default(),
        },
    );
    pending.account_index = Some(account_index);
    pending.nonce = Some(nonce);
    pending.details = vec![balance_detail(account_index, asset_id, -(amount as i64), 0)];
    pending
}

fn create_collection(id: u64, account_index: u32, nonce: i64, next: i64) -> PendingTransaction {
    let mut pending = tx(
        id,
        TxContent::CreateCollection {
            account_index,
            collection_id: next,
            fee_asset_id: 0,
            fee: BigUint::default(),
        },
    );
    pending.account_index = Some(account_index);
    pending.nonce = Some(nonce);
    pending.details = vec![TxDetail {
        asset_id: account_index as u64,
        account_index: Some(account_index),
        delta: BalanceDelta::CollectionNonce(next),
        order: 0,
    }];
    pending
}

fn nft(nft_index: u64, owner_account_index: u32) -> Nft {
    Nft {
        nft_index,
        creator_account_index: 0,
        owner_account_index,
        content_hash: [9u8; 32],
        origin_address: [0u8; 20],
        origin_token_id: BigUint::default(),
        creator_royalty_rate: 0,
        collection_id: 0,
        status: NftStatus::Confirmed,
    }
}

fn nft_detail(kind: NftMutationKind, nft: Nft) -> TxDetail {
    TxDetail {
        asset_id: nft.nft_index,
        account_index: None,
        delta: BalanceDelta::Nft(NftMutation { kind, nft }),
        order: 0,
    }
}

fn mint_nft(id: u64, account_index: u32, nonce: i64, nft_index: u64) -> PendingTransaction {
    let mut pending = tx(
        id,
        TxContent::MintNft {
            creator_account_index: account_index,
            to_account_index: account_index,
            nft_index,
            content_hash: [9u8; 32],
            collection_id: 0,
            creator_royalty_rate: 0,
            fee_asset_id: 0,
            fee: BigUint::default(),
        },
    );
    pending.account_index = Some(account_index);
    pending.nonce = Some(nonce);
    pending.details = vec![nft_detail(NftMutationKind::Mint, nft(nft_index, account_index))];
    pending
}

fn full_exit(id: u64, account_index: u32, asset_id: u16, amount: u64) -> PendingTransaction {
    let mut pending = tx(
        id,
        TxContent::FullExit {
            account_index,
            asset_id,
            amount: BigUint::from(amount),
        },
    );
    pending.account_index = Some(account_index);
    pending.details = vec![balance_detail(account_index, asset_id, -(amount as i64), 0)];
    pending
}

#[test]
fn registration_and_deposit_commit_one_block() {
    let committer = committer(2);
    committer
        .store()
        .push_pending_transaction(registration(1, 0, "alice"));
    committer
        .store()
        .push_pending_transaction(deposit(2, 0, 0, 100));

    let mut trees = ChainTrees::new_empty();
    let blocks = committer.run_commit_pass_at(&mut trees, 0, NOW_MS).unwrap();

    assert_eq!(blocks.len(), 1);
    let block = &blocks[0];
    assert_eq!(block.height, 1);
    assert_eq!(block.priority_operations, 2);
    assert_eq!(block.public_data_offsets.len(), 2);
    assert_eq!(block.state_root, trees.state_root());
    assert!(block
        .txs
        .iter()
        .all(|executed| executed.status == TxStatus::Success));
    assert!(block
        .txs
        .iter()
        .all(|executed| executed.block_height == Some(1)));

    let account = committer.store().account_by_index(0).unwrap();
    assert_eq!(account.status, AccountStatus::Confirmed);
    assert_eq!(
        account.assets.get(&0).unwrap().balance,
        BigUint::from(100u32)
    );
    assert_eq!(committer.store().current_height().unwrap(), 1);
    // The executed transactions left the backlog.
    assert!(committer
        .store()
        .list_pending_transactions()
        .is_err());
}

#[test]
fn underfilled_backlog_waits_for_deadline() {
    let committer = committer(10);
    for id in 0..5 {
        committer
            .store()
            .push_pending_transaction(registration(id, id as u32, "acct"));
    }

    let mut trees = ChainTrees::new_empty();
    let result = committer.run_commit_pass_at(&mut trees, 1_000_000, 1_000_500);
    assert!(matches!(result, Err(CommitterError::NotEnoughTransactions)));
    // Nothing was persisted and the backlog is untouched.
    assert!(committer.store().current_height().is_err());
    assert_eq!(
        committer
            .store()
            .list_pending_transactions()
            .unwrap()
            .len(),
        5
    );
    assert!(trees.asset_trees.is_empty());
}

#[test]
fn trailing_partial_slot_is_left_pending() {
    let committer = committer(2);
    committer
        .store()
        .push_pending_transaction(registration(1, 0, "alice"));
    committer
        .store()
        .push_pending_transaction(deposit(2, 0, 0, 10));
    committer
        .store()
        .push_pending_transaction(deposit(3, 0, 0, 20));

    let mut trees = ChainTrees::new_empty();
    let blocks = committer
        .run_commit_pass_at(&mut trees, NOW_MS - 1, NOW_MS)
        .unwrap();
    assert_eq!(blocks.len(), 1);
    // The third transaction waits for a full slot.
    assert_eq!(
        committer
            .store()
            .list_pending_transactions()
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn onchain_operations_hash_chains_withdraw_then_full_exit() {
    let committer = committer(2);
    committer
        .store()
        .push_pending_transaction(registration(1, 0, "alice"));
    committer
        .store()
        .push_pending_transaction(deposit(2, 0, 0, 100));

    let mut trees = ChainTrees::new_empty();
    committer.run_commit_pass_at(&mut trees, 0, NOW_MS).unwrap();

    let withdraw_tx = withdraw(3, 0, 1, 0, 30);
    let exit_tx = full_exit(4, 0, 0, 70);
    committer.store().push_pending_transaction(withdraw_tx.clone());
    committer.store().push_pending_transaction(exit_tx.clone());

    let blocks = committer
        .run_commit_pass_at(&mut trees, 0, NOW_MS + 1)
        .unwrap();
    assert_eq!(blocks.len(), 1);
    let block = &blocks[0];
    assert_eq!(block.height, 2);
    // FullExit is a priority operation, Withdraw is not.
    assert_eq!(block.priority_operations, 1);

    let withdraw_record = encode_tx_pub_data(&withdraw_tx.content, &EMPTY_STRING_KECCAK)
        .unwrap()
        .pub_data;
    let exit_record = encode_tx_pub_data(&exit_tx.content, &EMPTY_STRING_KECCAK)
        .unwrap()
        .pub_data;
    let expected = concat_keccak_hash(
        &concat_keccak_hash(&EMPTY_STRING_KECCAK, &withdraw_record),
        &exit_record,
    );
    assert_eq!(block.pending_onchain_operations_hash, expected);

    let account = committer.store().account_by_index(0).unwrap();
    assert_eq!(account.assets.get(&0).unwrap().balance, BigUint::default());
    assert_eq!(account.nonce, 1);
}

#[test]
fn insufficient_balance_fails_transaction_without_partial_mutation() {
    let committer = committer(3);
    committer
        .store()
        .push_pending_transaction(registration(1, 0, "alice"));
    committer
        .store()
        .push_pending_transaction(deposit(2, 0, 0, 10));

    // Credits asset 1 first, then overdraws asset 0; neither effect may land.
    let mut overdraw = withdraw(3, 0, 1, 0, 50);
    overdraw.details = vec![
        balance_detail(0, 1, 5, 0),
        balance_detail(0, 0, -50, 1),
    ];
    committer.store().push_pending_transaction(overdraw);

    let mut trees = ChainTrees::new_empty();
    let blocks = committer.run_commit_pass_at(&mut trees, 0, NOW_MS).unwrap();
    assert_eq!(blocks.len(), 1);
    let block = &blocks[0];
    assert_eq!(block.txs.len(), 3);
    assert_eq!(block.txs[2].status, TxStatus::Failed);

    let account = committer.store().account_by_index(0).unwrap();
    assert_eq!(account.assets.get(&0).unwrap().balance, BigUint::from(10u32));
    assert!(account.assets.get(&1).is_none());
    // The failed transaction did not consume the nonce.
    assert_eq!(account.nonce, 0);
    // Failed transactions contribute no pubdata and no hash-chain fold.
    assert_eq!(block.pending_onchain_operations_hash, EMPTY_STRING_KECCAK);
}

#[test]
fn expired_transaction_is_failed_without_effects() {
    let committer = committer(2);
    committer
        .store()
        .push_pending_transaction(registration(1, 0, "alice"));
    let mut stale = deposit(2, 0, 0, 100);
    stale.expired_at_ms = Some(NOW_MS - 1);
    committer.store().push_pending_transaction(stale);

    let mut trees = ChainTrees::new_empty();
    let blocks = committer.run_commit_pass_at(&mut trees, 0, NOW_MS).unwrap();
    let block = &blocks[0];
    assert_eq!(block.txs[1].status, TxStatus::Failed);
    assert_eq!(block.priority_operations, 1);

    let account = committer.store().account_by_index(0).unwrap();
    assert!(account.assets.get(&0).is_none());
}

#[test]
fn nonces_chain_within_a_slot() {
    let committer = committer(4);
    committer
        .store()
        .push_pending_transaction(registration(1, 0, "alice"));
    committer
        .store()
        .push_pending_transaction(deposit(2, 0, 0, 100));
    committer
        .store()
        .push_pending_transaction(withdraw(3, 0, 1, 0, 10));
    committer
        .store()
        .push_pending_transaction(withdraw(4, 0, 2, 0, 20));

    let mut trees = ChainTrees::new_empty();
    let blocks = committer.run_commit_pass_at(&mut trees, 0, NOW_MS).unwrap();
    assert!(blocks[0]
        .txs
        .iter()
        .all(|executed| executed.status == TxStatus::Success));

    let account = committer.store().account_by_index(0).unwrap();
    assert_eq!(account.nonce, 2);
    assert_eq!(account.assets.get(&0).unwrap().balance, BigUint::from(70u32));
}

#[test]
fn stale_nonce_aborts_the_pass() {
    let committer = committer(3);
    committer
        .store()
        .push_pending_transaction(registration(1, 0, "alice"));
    committer
        .store()
        .push_pending_transaction(deposit(2, 0, 0, 100));
    committer
        .store()
        .push_pending_transaction(withdraw(3, 0, 2, 0, 10));

    let mut trees = ChainTrees::new_empty();
    let result = committer.run_commit_pass_at(&mut trees, 0, NOW_MS);
    assert!(matches!(
        result,
        Err(CommitterError::InvalidNonce {
            account_index: 0,
            expected: 1,
            got: 2,
        })
    ));
}

#[test]
fn out_of_order_registration_aborts_the_pass() {
    let committer = committer(1);
    committer
        .store()
        .push_pending_transaction(registration(1, 3, "carol"));

    let mut trees = ChainTrees::new_empty();
    let result = committer.run_commit_pass_at(&mut trees, 0, NOW_MS);
    assert!(matches!(
        result,
        Err(CommitterError::UnexpectedAccountIndex { expected: 0, got: 3 })
    ));
}

#[test]
fn failed_registration_leaves_no_trace() {
    let committer = committer(2);
    // The first registration overdraws its own fresh account, so it must
    // fail without instantiating the asset sub-tree or the account leaf.
    let mut broke = registration(1, 0, "alice");
    broke.details = vec![balance_detail(0, 0, -5, 0)];
    committer.store().push_pending_transaction(broke);
    committer
        .store()
        .push_pending_transaction(registration(2, 0, "alice"));

    let mut trees = ChainTrees::new_empty();
    let blocks = committer.run_commit_pass_at(&mut trees, 0, NOW_MS).unwrap();
    let block = &blocks[0];
    assert_eq!(block.txs[0].status, TxStatus::Failed);
    assert_eq!(block.txs[1].status, TxStatus::Success);
    // The failed attempt was stamped with the untouched (nil) state root,
    // and only the retry contributed a priority operation.
    assert_eq!(block.txs[0].state_root, Some(ChainTrees::nil_state_root()));
    assert_eq!(block.priority_operations, 1);

    // Index 0 was still free for the retry, and exactly one sub-tree and
    // one account record exist afterwards.
    assert_eq!(trees.asset_trees.len(), 1);
    let account = committer.store().account_by_index(0).unwrap();
    assert_eq!(account.status, AccountStatus::Confirmed);
    let batch = committer.store().batch_at(1).unwrap();
    assert_eq!(batch.account_upserts.len(), 1);
}

#[test]
fn collection_nonce_advances_on_create_collection() {
    let committer = committer(2);
    committer
        .store()
        .push_pending_transaction(registration(1, 0, "alice"));
    committer
        .store()
        .push_pending_transaction(create_collection(2, 0, 1, 1));

    let mut trees = ChainTrees::new_empty();
    let blocks = committer.run_commit_pass_at(&mut trees, 0, NOW_MS).unwrap();
    assert!(blocks[0]
        .txs
        .iter()
        .all(|executed| executed.status == TxStatus::Success));

    let account = committer.store().account_by_index(0).unwrap();
    assert_eq!(account.collection_nonce, 1);
    assert_eq!(account.nonce, 1);
}

#[test]
fn wrong_collection_nonce_aborts_the_pass() {
    let committer = committer(2);
    committer
        .store()
        .push_pending_transaction(registration(1, 0, "alice"));
    committer
        .store()
        .push_pending_transaction(create_collection(2, 0, 1, 2));

    let mut trees = ChainTrees::new_empty();
    let result = committer.run_commit_pass_at(&mut trees, 0, NOW_MS);
    assert!(matches!(
        result,
        Err(CommitterError::InvalidCollectionNonce {
            account_index: 0,
            expected: 1,
            got: 2,
        })
    ));
}

#[test]
fn nft_mint_then_transfer_updates_ownership() {
    let committer = committer(4);
    committer
        .store()
        .push_pending_transaction(registration(1, 0, "alice"));
    committer
        .store()
        .push_pending_transaction(registration(2, 1, "bob"));
    committer
        .store()
        .push_pending_transaction(mint_nft(3, 0, 1, 5));

    let mut transfer = tx(
        4,
        TxContent::TransferNft {
            from_account_index: 0,
            to_account_index: 1,
            nft_index: 5,
            fee_asset_id: 0,
            fee: BigUint::default(),
        },
    );
    transfer.account_index = Some(0);
    transfer.nonce = Some(2);
    transfer.details = vec![nft_detail(NftMutationKind::Update, nft(5, 1))];
    committer.store().push_pending_transaction(transfer);

    let mut trees = ChainTrees::new_empty();
    let blocks = committer.run_commit_pass_at(&mut trees, 0, NOW_MS).unwrap();
    assert!(blocks[0]
        .txs
        .iter()
        .all(|executed| executed.status == TxStatus::Success));

    let token = committer.store().nft_by_index(5).unwrap();
    assert_eq!(token.owner_account_index, 1);
    // Minted and transferred in the same slot: the batch records one insert
    // carrying the final owner, no separate upsert.
    let batch = committer.store().batch_at(1).unwrap();
    assert_eq!(batch.nft_inserts.len(), 1);
    assert_eq!(batch.nft_inserts[0].owner_account_index, 1);
    assert!(batch.nft_upserts.is_empty());
}

#[test]
fn minting_an_existing_nft_aborts_the_pass() {
    let committer = committer(2);
    committer.store().put_nft(nft(5, 1));
    committer
        .store()
        .push_pending_transaction(registration(1, 0, "alice"));
    committer
        .store()
        .push_pending_transaction(mint_nft(2, 0, 1, 5));

    let mut trees = ChainTrees::new_empty();
    let result = committer.run_commit_pass_at(&mut trees, 0, NOW_MS);
    assert!(matches!(
        result,
        Err(CommitterError::NftMutationConflict {
            nft_index: 5,
            kind: NftMutationKind::Mint,
        })
    ));
}

#[test]
fn create_pair_seeds_the_liquidity_tree() {
    let committer = committer(1);
    let mut pending = tx(
        1,
        TxContent::CreatePair {
            pair_index: 0,
            asset_a_id: 1,
            asset_b_id: 2,
            fee_rate: 30,
            treasury_account_index: 0,
            treasury_rate: 5,
        },
    );
    pending.details = vec![TxDetail {
        asset_id: 0,
        account_index: None,
        delta: BalanceDelta::Liquidity(LiquidityDelta {
            asset_a_id: 1,
            asset_b_id: 2,
            asset_a: BigInt::default(),
            asset_b: BigInt::default(),
            lp_supply: BigInt::default(),
            k_last: BigUint::default(),
            fee_rate: 30,
            treasury_account_index: 0,
            treasury_rate: 5,
        }),
        order: 0,
    }];
    committer.store().push_pending_transaction(pending);

    let mut trees = ChainTrees::new_empty();
    let blocks = committer.run_commit_pass_at(&mut trees, 0, NOW_MS).unwrap();
    assert_eq!(blocks[0].txs[0].status, TxStatus::Success);

    let pool = committer.store().liquidity_by_pair_index(0).unwrap();
    assert_eq!(pool.asset_a_id, 1);
    assert_eq!(pool.fee_rate, 30);
    // The pool leaf moved the liquidity tree off its nil root.
    assert_ne!(
        trees.liquidity_tree.root(),
        ChainTrees::new_empty().liquidity_tree.root()
    );
}

#[test]
fn oversized_asset_id_aborts_the_pass() {
    let committer = committer(2);
    committer
        .store()
        .push_pending_transaction(registration(1, 0, "alice"));
    // An id one past the 16-bit range must abort, not alias asset 0.
    let mut pending = deposit(2, 0, 0, 100);
    pending.details[0].asset_id = 65_536;
    committer.store().push_pending_transaction(pending);

    let mut trees = ChainTrees::new_empty();
    let result = committer.run_commit_pass_at(&mut trees, 0, NOW_MS);
    assert!(matches!(
        result,
        Err(CommitterError::AssetIdOutOfRange {
            asset_id: 65_536,
            tx_id: 2,
        })
    ));
}

#[test]
fn identical_backlogs_commit_identically() {
    let run = || {
        let committer = committer(3);
        committer
            .store()
            .push_pending_transaction(registration(1, 0, "alice"));
        committer
            .store()
            .push_pending_transaction(deposit(2, 0, 0, 100));
        committer
            .store()
            .push_pending_transaction(withdraw(3, 0, 1, 0, 40));
        let mut trees = ChainTrees::new_empty();
        let blocks = committer.run_commit_pass_at(&mut trees, 0, NOW_MS).unwrap();
        (blocks[0].commitment, blocks[0].state_root)
    };
    assert_eq!(run(), run());
}
