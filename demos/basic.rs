use dynfilter::*;

#[derive(Debug, Default, Clone)]
struct Person {
    id: i64,
    name: String,
    age: u8,
}

impl_record!(Person { id, name, age });

fn main() -> Result<(), FilterError> {
    // 1. Records to filter
    let people = vec![
        Person { id: 1, name: "Ada".into(), age: 36 },
        Person { id: 2, name: "Alan".into(), age: 41 },
        Person { id: 3, name: "Grace".into(), age: 85 },
    ];

    // 2. Build a filter: name contains "A" and age < 40, or id == 3
    let mut filter = Filter::new();
    filter.add("name", Comparison::Contains, "A");
    filter.add("age", Comparison::LessThan, 40);
    filter.or("id", Comparison::Equal, 3);

    // 3. Compile and run a predicate
    let predicate = filter.predicate::<Person>()?;
    println!("Predicate: {}", predicate.text());
    for person in predicate.filter(&people) {
        println!("  matches: {:?}", person);
    }

    // 4. Generate a query clause and its parameter values
    let clause = filter.query_clause::<Person>()?;
    println!("Clause: {}", clause.text());
    println!("Parameters: {:?} -> {:?}", clause.parameters(), clause.values());
    Ok(())
}
