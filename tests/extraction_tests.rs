/// Extraction behaviour on realistic prospect messages
use rust_sabbar_api::extraction::{extract, extract_budget, extract_contact, BudgetBound};
use rust_sabbar_api::models::{Amenity, PropertyType, TransactionType};

#[test]
fn test_budget_bounds() {
    let c = extract("budget max 2 millions");
    assert_eq!(c.budget_max, Some(2_000_000));
    assert_eq!(c.budget_min, None);

    let c = extract("à partir de 800000 dirhams");
    assert_eq!(c.budget_min, Some(800_000));
    assert_eq!(c.budget_max, None);

    // No bound word: treated as a ceiling
    assert_eq!(
        extract_budget("autour de 1 200 000 MAD"),
        Some(BudgetBound::Max(1_200_000))
    );
    assert_eq!(
        extract_budget("jusqu'à 1,5 million"),
        Some(BudgetBound::Max(1_500_000))
    );
}

#[test]
fn test_budget_ignores_phone_numbers_and_surfaces() {
    assert_eq!(extract_budget("appelez-moi au 0612345678"), None);
    assert_eq!(extract_budget("un appartement de 120 m2"), None);
    assert_eq!(
        extract_budget("mon numéro 0612345678, budget 900000"),
        Some(BudgetBound::Max(900_000))
    );
}

#[test]
fn test_full_brief() {
    let c = extract(
        "Bonjour, je veux acheter une villa à Marrakech dans la Palmeraie, \
         4 chambres, 350 m², avec piscine et jardin, budget maximum 6 millions, \
         d'ici 3 mois",
    );

    assert_eq!(c.transaction_type, Some(TransactionType::Sale));
    assert!(c.property_types.contains(&PropertyType::Villa));
    assert!(c.cities.contains("Marrakech"));
    assert!(c.neighborhoods.contains("Palmeraie"));
    assert_eq!(c.rooms, Some(4));
    assert_eq!(c.area, Some(350));
    assert!(c.amenities.contains(&Amenity::Pool));
    assert!(c.amenities.contains(&Amenity::Garden));
    assert_eq!(c.budget_max, Some(6_000_000));
    assert_eq!(c.timeframe.as_deref(), Some("3 mois"));
}

#[test]
fn test_transaction_priority() {
    assert_eq!(
        extract("location saisonnière à Agadir").transaction_type,
        Some(TransactionType::VacationRental)
    );
    assert_eq!(
        extract("je veux louer un studio").transaction_type,
        Some(TransactionType::Rent)
    );
    // Purchase vocabulary wins over rental vocabulary
    assert_eq!(
        extract("acheter pour mettre en location").transaction_type,
        Some(TransactionType::Sale)
    );
}

#[test]
fn test_city_aliases_are_canonicalized() {
    let c = extract("Casa ou Fez, peu importe");
    assert!(c.cities.contains("Casablanca"));
    assert!(c.cities.contains("Fès"));
    assert_eq!(c.cities.len(), 2);

    // No city inside an unrelated word
    assert!(extract("je suis professionnel").cities.is_empty());
}

#[test]
fn test_extraction_is_idempotent() {
    let text = "Je cherche un appartement meublé à Rabat Agdal, 2 chambres, budget 7500 par mois";
    assert_eq!(extract(text), extract(text));
    assert_eq!(extract_contact(text), extract_contact(text));
}

#[test]
fn test_contact_extraction() {
    let contact = extract_contact(
        "Je m'appelle Salma Bennani, joignable au +212 6 12 34 56 78 ou salma.b@example.ma",
    );
    assert_eq!(contact.name.as_deref(), Some("Salma Bennani"));
    assert_eq!(contact.phone.as_deref(), Some("+212612345678"));
    assert_eq!(contact.email.as_deref(), Some("salma.b@example.ma"));

    let nothing = extract_contact("je suis intéressé par une villa");
    assert_eq!(nothing.name, None);
    assert_eq!(nothing.phone, None);
    assert_eq!(nothing.email, None);
}
