//! # Seed Data Generator
//!
//! Populates a demo pharmacy with medicines, stock and sale history for
//! development.
//!
//! ## Usage
//! ```bash
//! # Seed the default demo shop (./data/demo-pharmacy.db)
//! cargo run -p pharmapos-db --bin seed
//!
//! # Custom shop and volume
//! cargo run -p pharmapos-db --bin seed -- --tenant my-shop --sales 500
//!
//! # Specify the data directory
//! cargo run -p pharmapos-db --bin seed -- --data-dir ./var/pharmapos
//! ```
//!
//! ## What Gets Created
//! - One owner account plus two counter workers in the shared directory
//! - A catalog of common Pakistani retail medicines (bulk import path)
//! - One stock batch per medicine, staggered expiry dates
//! - Sale history spread over the last two weeks and across the sellers,
//!   cash and due mixed
//! - A handful of pending purchase orders
//!
//! Prices are plausible, not real. Everything is deterministic for a given
//! set of arguments.

use std::env;

use chrono::Utc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use pharmapos_core::{Discount, DoseForm, PaymentStatus, SellerScope, TenantSlug};
use pharmapos_db::repository::medicine::NewMedicine;
use pharmapos_db::repository::purchase::NewPurchaseOrder;
use pharmapos_db::repository::report::DashboardRange;
use pharmapos_db::repository::sale::{NewSale, NewSaleLine};
use pharmapos_db::repository::stock::NewStockBatch;
use pharmapos_db::repository::user::{NewOwner, NewWorker};
use pharmapos_db::{PharmacyStore, StoreConfig};

/// Catalog rows: name, generic, strength, form, manufacturer, retail paisa
/// per unit, units per strip.
const MEDICINES: &[(&str, &str, &str, DoseForm, &str, i64, i64)] = &[
    ("Panadol", "Paracetamol", "500mg", DoseForm::Tablet, "GSK", 350, 10),
    ("Panadol Extra", "Paracetamol + Caffeine", "500mg", DoseForm::Tablet, "GSK", 450, 10),
    ("Brufen", "Ibuprofen", "400mg", DoseForm::Tablet, "Abbott", 550, 10),
    ("Augmentin", "Co-Amoxiclav", "625mg", DoseForm::Tablet, "GSK", 5200, 6),
    ("Amoxil", "Amoxicillin", "500mg", DoseForm::Capsule, "GSK", 2400, 12),
    ("Flagyl", "Metronidazole", "400mg", DoseForm::Tablet, "Sanofi", 900, 10),
    ("Ponstan", "Mefenamic Acid", "500mg", DoseForm::Tablet, "Pfizer", 650, 10),
    ("Disprin", "Aspirin", "300mg", DoseForm::Tablet, "Reckitt", 250, 10),
    ("Calpol", "Paracetamol", "120mg/5ml", DoseForm::Syrup, "GSK", 9500, 1),
    ("Ventolin", "Salbutamol", "100mcg", DoseForm::Other, "GSK", 28500, 1),
    ("Risek", "Omeprazole", "20mg", DoseForm::Capsule, "Getz Pharma", 1600, 14),
    ("Softin", "Loratadine", "10mg", DoseForm::Tablet, "Werrick", 800, 10),
    ("Arinac Forte", "Ibuprofen + Pseudoephedrine", "400mg", DoseForm::Tablet, "Abbott", 700, 10),
    ("Nuberol Forte", "Paracetamol + Orphenadrine", "650mg", DoseForm::Tablet, "Searle", 950, 10),
    ("Cefspan", "Cefixime", "400mg", DoseForm::Capsule, "Barrett Hodgson", 7800, 5),
    ("Zopent", "Pantoprazole", "40mg", DoseForm::Tablet, "Getz Pharma", 2200, 14),
    ("Ciproxin", "Ciprofloxacin", "500mg", DoseForm::Tablet, "Bayer", 3900, 10),
    ("Surbex-Z", "Multivitamin + Zinc", "", DoseForm::Tablet, "Abbott", 1500, 30),
    ("Gaviscon", "Alginate", "", DoseForm::Syrup, "Reckitt", 32000, 1),
    ("Betnovate-N", "Betamethasone + Neomycin", "", DoseForm::Ointment, "GSK", 12500, 1),
    ("Dettol", "Chloroxylenol", "", DoseForm::Other, "Reckitt", 18000, 1),
    ("Hydryllin", "Aminophylline", "", DoseForm::Syrup, "Searle", 11000, 1),
    ("Sangobion", "Iron + Vitamins", "", DoseForm::Capsule, "Merck", 1800, 10),
    ("Neurobion", "Vitamin B Complex", "", DoseForm::Tablet, "Merck", 1400, 30),
    ("Glucophage", "Metformin", "500mg", DoseForm::Tablet, "Merck", 850, 10),
];

/// Walk-in names for sale history. `None` is an anonymous counter sale.
const CUSTOMERS: &[Option<(&str, &str)>] = &[
    Some(("Ahmed Hassan", "+92-300-1112233")),
    Some(("Fatima Noor", "+92-321-4455667")),
    Some(("Muhammad Usman", "+92-333-7788990")),
    Some(("Ayesha Siddiqui", "+92-301-2233445")),
    Some(("Bilal Sheikh", "+92-345-6677889")),
    None,
    Some(("Zainab Malik", "+92-312-9900112")),
    None,
    Some(("Hassan Raza", "+92-322-3344556")),
    None,
    None,
];

const RESTOCK_REQUESTS: &[(&str, i64, i64)] = &[
    ("Panadol CF", 10, 0),
    ("Insulin Mixtard", 0, 24),
    ("Rigix 10mg", 5, 0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut tenant_slug = String::from("demo-pharmacy");
    let mut data_dir = String::from("./data");
    let mut sale_count: usize = 200;
    let mut ephemeral = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant_slug = args[i + 1].clone();
                    i += 1;
                }
            }
            "--data-dir" | "-d" => {
                if i + 1 < args.len() {
                    data_dir = args[i + 1].clone();
                    i += 1;
                }
            }
            "--sales" | "-s" => {
                if i + 1 < args.len() {
                    sale_count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--ephemeral" => {
                ephemeral = true;
            }
            "--help" | "-h" => {
                println!("PharmaPOS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -t, --tenant <SLUG>    Shop slug to seed (default: demo-pharmacy)");
                println!("  -d, --data-dir <PATH>  Data directory (default: ./data)");
                println!("  -s, --sales <N>        Number of sales to generate (default: 200)");
                println!("      --ephemeral        In-memory run, nothing written to disk");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_target(false)
        .init();

    println!("🌱 PharmaPOS Seed Data Generator");
    println!("================================");
    println!("Tenant:   {tenant_slug}");
    println!("Data dir: {}", if ephemeral { "(in-memory)" } else { &data_dir });
    println!("Sales:    {sale_count}");
    println!();

    let config = if ephemeral {
        StoreConfig::ephemeral()
    } else {
        StoreConfig::new(&data_dir)
    };
    let store = PharmacyStore::new(config);
    let tenant = TenantSlug::new(&tenant_slug)?;

    println!("✓ Store initialized");

    // Refuse to double-seed: the catalog slugs would all collide anyway.
    let existing = store.catalog().list(&tenant, Some(1), Some(1)).await?;
    if existing.total > 0 {
        println!("⚠ Tenant already has {} medicines", existing.total);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the tenant database file to regenerate.");
        return Ok(());
    }

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------
    let shop_name = tenant_slug
        .split('-')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    let users = store.users();
    let owner = match users.find_by_email(&format!("owner@{tenant_slug}.pk")).await? {
        Some(existing) => existing,
        None => {
            users
                .register_owner(NewOwner {
                    name: "Imran Khalid".into(),
                    email: format!("owner@{tenant_slug}.pk"),
                    password_hash: "$argon2id$v=19$m=19456,t=2,p=1$demoseed$demoseed".into(),
                    shop_name: shop_name.clone(),
                    location: Some("Lahore".into()),
                    phone: Some("+92-300-0000001".into()),
                })
                .await?
        }
    };

    let mut seller_ids = vec![owner.id.clone()];
    for (idx, worker_name) in ["Ali Raza", "Sana Tariq"].iter().enumerate() {
        let email = format!("worker{}@{tenant_slug}.pk", idx + 1);
        let worker = match users.find_by_email(&email).await? {
            Some(existing) => existing,
            None => {
                users
                    .register_worker(NewWorker {
                        name: (*worker_name).into(),
                        email,
                        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$demoseed$demoseed".into(),
                        owner_slug: owner.slug.clone(),
                        phone: None,
                    })
                    .await?
            }
        };
        seller_ids.push(worker.id);
    }
    println!("✓ Accounts ready ({} sellers)", seller_ids.len());

    // -------------------------------------------------------------------------
    // Catalog (exercises the bulk import path)
    // -------------------------------------------------------------------------
    let rows: Vec<NewMedicine> = MEDICINES
        .iter()
        .map(|(name, generic, strength, form, maker, price, pack)| NewMedicine {
            name: (*name).to_string(),
            generic_name: Some((*generic).to_string()),
            dose_form: *form,
            strength: (!strength.is_empty()).then(|| (*strength).to_string()),
            manufacturer: Some((*maker).to_string()),
            unit_price_cents: *price,
            pack_size: Some(*pack),
        })
        .collect();

    let report = store.catalog().import_bulk(&tenant, rows).await?;
    println!(
        "✓ Catalog imported: {} medicines ({} chunks)",
        report.inserted, report.chunks
    );

    // -------------------------------------------------------------------------
    // Stock
    // -------------------------------------------------------------------------
    let catalog = store.catalog().list(&tenant, Some(1), Some(100)).await?;
    let stock = store.stock();
    let mut batches = Vec::with_capacity(catalog.items.len());

    for (idx, medicine) in catalog.items.iter().enumerate() {
        // Expiry staggered 2 months to 2 years out; purchase cost 55-75% of
        // retail, varied by index.
        let expiry = Utc::now().date_naive() + chrono::Duration::days(60 + ((idx * 53) % 670) as i64);
        let cost_pct = 55 + (idx * 7) % 20;
        let batch = stock
            .intake(
                &tenant,
                NewStockBatch {
                    medicine_id: medicine.id.clone(),
                    batch_number: None,
                    boxes: 2,
                    cartons_per_box: 5,
                    strips_per_carton: 4,
                    units_per_strip: 10 + (idx % 3) as i64 * 5,
                    expiry_date: Some(expiry),
                    purchase_price_cents: medicine.unit_price_cents * cost_pct as i64 / 100,
                    selling_price_cents: medicine.unit_price_cents,
                },
            )
            .await?;
        batches.push(batch);
    }
    println!("✓ Stock intake: {} batches", batches.len());

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------
    println!();
    println!("Generating sales...");
    let start = std::time::Instant::now();
    let sales = store.sales();
    let shop_db = store.registry().tenant(&tenant).await?;
    let mut generated = 0usize;
    let mut due_ids = Vec::new();

    for n in 0..sale_count {
        let batch = &batches[n % batches.len()];
        let second = &batches[(n * 13 + 5) % batches.len()];
        let seller = &seller_ids[n % seller_ids.len()];
        let customer = CUSTOMERS[n % CUSTOMERS.len()];

        let mut items = vec![NewSaleLine {
            batch_id: batch.id.clone(),
            quantity: 1 + (n % 3) as i64,
            discount: (n % 5 == 0).then(|| Discount::percentage(500)),
        }];
        if n % 4 == 0 && second.id != batch.id {
            items.push(NewSaleLine {
                batch_id: second.id.clone(),
                quantity: 1,
                discount: None,
            });
        }

        // Every seventh sale goes on the books as due; named customers only.
        let status = if n % 7 == 0 && customer.is_some() {
            PaymentStatus::Due
        } else {
            PaymentStatus::Paid
        };

        let created = sales
            .create_sale(
                &tenant,
                NewSale {
                    seller_id: seller.clone(),
                    issued_by: None,
                    customer_name: customer.map(|(name, _)| name.to_string()),
                    customer_phone: customer.map(|(_, phone)| phone.to_string()),
                    discount: if n % 11 == 0 {
                        Discount::fixed(2000)
                    } else {
                        Discount::none()
                    },
                    payment_status: status,
                    paid_amount_cents: None,
                    payment_type: Some(if n % 3 == 0 { "card" } else { "cash" }.to_string()),
                    transaction_id: None,
                    declared_total_cents: None,
                    items,
                },
            )
            .await;

        match created {
            Ok(sale) => {
                // Back-date most sales across the last two weeks so the
                // weekly and monthly views have shape. Multiples of 14 stay
                // at now and populate the today view.
                let days_back = (n * 11) % 14;
                if days_back > 0 {
                    let shifted = Utc::now()
                        - chrono::Duration::days(days_back as i64)
                        - chrono::Duration::hours(((n * 7) % 12) as i64);
                    sqlx::query("UPDATE sales SET created_at = ?2 WHERE id = ?1")
                        .bind(&sale.sale.id)
                        .bind(shifted)
                        .execute(shop_db.pool())
                        .await?;
                }
                if status == PaymentStatus::Due {
                    due_ids.push(sale.sale.id.clone());
                }
                generated += 1;
                if generated % 50 == 0 {
                    println!("  Generated {generated} sales...");
                }
            }
            // A batch can genuinely sell out while seeding; skip and move on.
            Err(e) => eprintln!("  Skipped sale {n}: {e}"),
        }
    }

    // Settle a third of the due sales so both states show up in reports.
    let settled = due_ids.len() / 3;
    for sale_id in due_ids.iter().take(settled) {
        sales.mark_paid(&tenant, sale_id).await?;
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {generated} sales in {elapsed:?}");
    println!("  {} due, {} of those settled", due_ids.len(), settled);

    // -------------------------------------------------------------------------
    // Purchase orders
    // -------------------------------------------------------------------------
    let purchase = store.purchase_orders();
    for (name, boxes, units) in RESTOCK_REQUESTS {
        purchase
            .create(
                &tenant,
                NewPurchaseOrder {
                    medicine_name: (*name).to_string(),
                    quantity_boxes: *boxes,
                    quantity_units: *units,
                    note: None,
                    requested_by: Some(owner.id.clone()),
                },
            )
            .await?;
    }
    println!("✓ Raised {} purchase orders", RESTOCK_REQUESTS.len());

    // -------------------------------------------------------------------------
    // Verify with the reporting side
    // -------------------------------------------------------------------------
    println!();
    println!("Today's dashboard:");
    let today = store
        .reports()
        .dashboard(&tenant, &SellerScope::all(), DashboardRange::Today)
        .await?;
    println!("  Sales:     {}", today.sales_count);
    println!("  Revenue:   Rs {:.2}", today.revenue_cents as f64 / 100.0);

    println!("This month:");
    let month = store
        .reports()
        .dashboard(&tenant, &SellerScope::all(), DashboardRange::Month)
        .await?;
    println!("  Sales:     {}", month.sales_count);
    println!("  Revenue:   Rs {:.2}", month.revenue_cents as f64 / 100.0);
    println!(
        "  Profit:    Rs {:.2} ({:.2}% margin)",
        month.profit_cents as f64 / 100.0,
        month.margin_percent
    );
    println!("  Due:       Rs {:.2}", month.total_due_cents as f64 / 100.0);
    if let Some(top) = month.top_products.first() {
        println!("  Top item:  {} ({} units)", top.medicine_name, top.units_sold);
    }

    let board = store.reports().seller_leaderboard(&tenant).await?;
    println!("  Sellers:   {} on the board", board.cards.len());

    println!();
    println!("✓ Seed complete!");

    store.close().await;
    Ok(())
}
